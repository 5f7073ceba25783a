use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};

use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use csv::{Reader, ReaderBuilder};

use crate::error::Error;

pub fn read_lines<P>(filename: P) -> Result<io::Lines<io::BufReader<File>>>
where
    P: AsRef<Path>,
{
    let name = filename.as_ref().display();
    let file = match File::open(&filename) {
        Ok(x) => x,
        Err(err) => {
            let msg = format!("failed to open {name}: {err}");
            return Err(std::io::Error::new(std::io::ErrorKind::NotFound, msg))?;
        }
    };
    Ok(io::BufReader::new(file).lines())
}

/// Read a whole text file, reporting a missing file as [`Error::FileNotFound`].
pub fn read_to_string(path: &Path) -> Result<String> {
    match std::fs::read_to_string(path) {
        Ok(s) => Ok(s),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Err(eyre!(Error::FileNotFound {
            path: path.to_path_buf()
        })),
        Err(err) => Err(err).wrap_err(Error::Io {
            path: path.to_path_buf()
        }),
    }
}

/// First line of a file with surrounding whitespace removed, `None` for a missing or empty file.
pub fn read_first_line(path: &Path) -> Option<String> {
    let mut lines = read_lines(path).ok()?;
    let line = lines.next()?.ok()?;
    let line = line.trim();
    match line.is_empty() {
        true => None,
        false => Some(line.to_string()),
    }
}

// Tab-separated files written by the estimator may have ragged trailing lines
pub fn get_tsv_reader<R: io::Read>(input: R, has_headers: bool) -> Reader<R> {
    ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(has_headers)
        .flexible(true)
        .from_reader(input)
}

/// Open `filename` for writing, or stdout for `None` and `-`.
pub fn get_output(filename: Option<PathBuf>) -> Result<Box<dyn io::Write>> {
    let output: Box<dyn io::Write> = match filename {
        Some(path) if path.as_os_str() == "-" => Box::new(io::stdout()),
        Some(path) => Box::new(
            std::fs::File::options()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&path)
                .wrap_err(Error::Io { path })?,
        ),
        None => Box::new(io::stdout()),
    };
    Ok(output)
}

/// Replace the contents of `path` with `contents` in a single write.
pub fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).wrap_err(Error::Io {
                path: parent.to_path_buf()
            })?;
        }
    }

    let mut output = get_output(Some(path.to_path_buf()))?;
    output
        .write_all(contents.as_bytes())
        .wrap_err(Error::Io {
            path: path.to_path_buf()
        })?;
    output.flush()?;
    Ok(())
}

/// Remove a file, treating a missing file as already removed.
pub fn remove_if_exists(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).wrap_err(Error::Io {
            path: path.to_path_buf()
        }),
    }
}

/// Forward every chunk of `input` into `tx` until EOF or until the receiver is dropped.
///
/// Chunks are split at newlines when possible but a chunk is not guaranteed to be a full
/// line. Invalid UTF-8 is replaced rather than aborting the pump.
pub fn spawn_line_pump<R, T, F>(input: R, tx: Sender<T>, wrap: F) -> JoinHandle<()>
where
    R: io::Read + Send + 'static,
    T: Send + 'static,
    F: Fn(String) -> T + Send + 'static,
{
    thread::spawn(move || {
        let mut reader = BufReader::new(input);
        let mut buf = Vec::new();

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {
                    let text = String::from_utf8_lossy(&buf).into_owned();
                    if tx.send(wrap(text)).is_err() {
                        break;
                    }
                }
                Err(err) => {
                    tracing::debug!("Stopped reading process output: {err}");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc::channel;

    use super::*;

    #[test]
    fn pump_forwards_chunks_in_order() {
        let (tx, rx) = channel();
        let input = io::Cursor::new(b"first\nsecond\nthird".to_vec());
        spawn_line_pump(input, tx, |s| s).join().unwrap();

        let chunks: Vec<String> = rx.try_iter().collect();
        assert_eq!(vec!["first\n", "second\n", "third"], chunks);
    }

    #[test]
    fn missing_file_is_not_found() {
        let report = read_to_string(Path::new("tests/data/does_not_exist.txt")).unwrap_err();
        assert!(matches!(
            report.downcast_ref::<Error>(),
            Some(Error::FileNotFound { .. })
        ));
    }
}
