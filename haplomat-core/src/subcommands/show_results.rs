use std::io::Write;
use std::path::Path;

use color_eyre::Result;
use serde::Serialize;

use crate::args::{DisplayArgs, GraphArgs};
use crate::graphs::ScatterGraph;
use crate::io::get_output;
use crate::parameters::{self, run_id_prefix};
use crate::results::{ingest, DisplayPolicy, HaplotypeFrequency, Ingestion, ResultSet, Statistics};

#[derive(Serialize, Debug)]
struct Summary<'a> {
    statistics: Statistics,
    policy: DisplayPolicy,
    haplotypes: &'a [HaplotypeFrequency],
}

#[doc(hidden)]
#[tracing::instrument(skip(graph_args, display_args), fields(display = ?display_args))]
pub fn run(
    parameters: &Path,
    display_args: &DisplayArgs,
    json: bool,
    plot: Option<&Path>,
    graph_args: GraphArgs,
) -> Result<()> {
    let policy = display_args.policy()?;
    let params = parameters::load(parameters)?;

    let results = match ingest(&params.paths())? {
        Ingestion::Ready(results) => results,
        ingestion @ Ingestion::NoGenotypes(_) => {
            if let Some(notice) = ingestion.notice() {
                notice.log();
            }
            return Ok(());
        }
    };

    match json {
        true => {
            let summary = Summary {
                statistics: results.statistics(),
                policy,
                haplotypes: results.displayed(policy),
            };
            let mut output = get_output(None)?;
            serde_json::to_writer_pretty(&mut output, &summary)?;
            writeln!(output)?;
        }
        false => print_results(&results, policy)?,
    }

    if let Some(dir) = plot {
        let prefix = run_id_prefix(&params.run_id);
        draw_plots(&results, policy, dir, &prefix, graph_args)?;
    }

    Ok(())
}

#[doc(hidden)]
pub fn print_results(results: &ResultSet, policy: DisplayPolicy) -> Result<()> {
    let stats = results.statistics();
    let mut output = get_output(None)?;

    writeln!(output, "Number of haplotypes: {}", stats.haplotype_count)?;
    writeln!(output, "Number of genotypes: {}", stats.genotype_count)?;
    writeln!(
        output,
        "Recommended epsilon: {} ({} haplotypes with a frequency of at least this)",
        stats.recommended_epsilon_text, stats.above_recommended_epsilon
    )?;
    writeln!(output, "Sum of cut haplotype frequencies: {}", stats.cut_mass)?;
    writeln!(output)?;
    writeln!(output, "{}", results.table(policy))?;

    Ok(())
}

/// Write `<prefix>frequencies.svg` and `<prefix>epsilon.svg` into `dir`.
#[doc(hidden)]
pub fn draw_plots(
    results: &ResultSet,
    policy: DisplayPolicy,
    dir: &Path,
    prefix: &str,
    graph_args: GraphArgs,
) -> Result<()> {
    let (x, y) = graph_args.scales();

    let mut graph = ScatterGraph::new(graph_args.clone());
    graph.draw_graph(
        "Haplotype frequencies",
        "rank",
        "frequency",
        &results.frequency_points(policy, x, y),
    );
    let output = dir.join(format!("{prefix}frequencies.svg"));
    svg::save(&output, &graph.document)?;
    tracing::info!("Frequency plot saved as {output:?}");

    let mut graph = ScatterGraph::new(graph_args);
    graph.draw_graph(
        "Convergence",
        "iteration",
        "epsilon",
        &results.trace_points(x, y),
    );
    let output = dir.join(format!("{prefix}epsilon.svg"));
    svg::save(&output, &graph.document)?;
    tracing::info!("Epsilon plot saved as {output:?}");

    Ok(())
}
