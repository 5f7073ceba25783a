use svg::node::element::path::Data;
use svg::node::element::{Circle, Element, Path};
use svg::node::Text;
use svg::Document;
use svg::Node;

use crate::args::GraphArgs;
use crate::results::AxisScale;

const TICKS: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Bounds {
    /// Bounding box of the points. A flat range is widened so that it can be scaled.
    pub fn from_points(points: &[[f64; 2]]) -> Option<Self> {
        let first = points.first()?;
        let mut b = Self {
            min_x: first[0],
            max_x: first[0],
            min_y: first[1],
            max_y: first[1],
        };
        for [x, y] in points {
            b.min_x = b.min_x.min(*x);
            b.max_x = b.max_x.max(*x);
            b.min_y = b.min_y.min(*y);
            b.max_y = b.max_y.max(*y);
        }
        if b.max_x == b.min_x {
            b.min_x -= 0.5;
            b.max_x += 0.5;
        }
        if b.max_y == b.min_y {
            b.min_y -= 0.5;
            b.max_y += 0.5;
        }
        Some(b)
    }
}

fn axis_label(label: &str, scale: AxisScale) -> String {
    match scale {
        AxisScale::Linear => label.to_string(),
        AxisScale::Log10 => format!("log10({label})"),
    }
}

fn tick_label(value: f64) -> String {
    if value != 0.0 && value.abs() < 1e-2 {
        format!("{value:.1e}")
    } else {
        format!("{value:.2}")
    }
}

#[derive(Debug)]
pub struct ScatterGraph {
    pub document: Document,
    pub s: GraphArgs,
    margin: f32,
}

impl ScatterGraph {
    pub fn new(s: GraphArgs) -> Self {
        let document = Document::new()
            .set("viewBox", (0, 0, s.width, s.height))
            .set("style", format!("background-color:{}", s.background_color));

        Self {
            document,
            margin: s.font_size * 5.0,
            s,
        }
    }

    /// Draw `points`, which are already transformed to the axis scales.
    pub fn draw_graph(&mut self, title: &str, x_label: &str, y_label: &str, points: &[[f64; 2]]) {
        let (x_scale, y_scale) = self.s.scales();

        self.draw_text(self.s.width / 2.0, self.s.font_size * 1.5, title, "middle", None);
        self.draw_text(
            self.s.width / 2.0,
            self.s.height - self.s.font_size * 0.5,
            &axis_label(x_label, x_scale),
            "middle",
            None,
        );
        self.draw_text(
            self.s.font_size * 1.2,
            self.s.height / 2.0,
            &axis_label(y_label, y_scale),
            "middle",
            Some(-90),
        );

        let Some(bounds) = Bounds::from_points(points) else {
            self.draw_text(
                self.s.width / 2.0,
                self.s.height / 2.0,
                "No data",
                "middle",
                None,
            );
            return;
        };

        self.draw_axes(&bounds);

        for point in points {
            let (cx, cy) = self.to_canvas(point, &bounds);
            let circle = Circle::new()
                .set("cx", cx)
                .set("cy", cy)
                .set("r", self.s.radius)
                .set("fill", self.s.marker_color.as_str());
            self.document.append(circle);
        }
    }

    fn to_canvas(&self, point: &[f64; 2], b: &Bounds) -> (f32, f32) {
        let plot_width = self.s.width - 2.0 * self.margin;
        let plot_height = self.s.height - 2.0 * self.margin;
        let x = (point[0] - b.min_x) / (b.max_x - b.min_x);
        let y = (point[1] - b.min_y) / (b.max_y - b.min_y);
        (
            self.margin + x as f32 * plot_width,
            self.s.height - self.margin - y as f32 * plot_height,
        )
    }

    fn draw_axes(&mut self, b: &Bounds) {
        let left = self.margin;
        let right = self.s.width - self.margin;
        let top = self.margin;
        let bottom = self.s.height - self.margin;

        let axes = Data::new()
            .move_to((left, top))
            .line_to((left, bottom))
            .line_to((right, bottom));
        let axes = Path::new()
            .set("fill", "none")
            .set("stroke", self.s.color.as_str())
            .set("stroke-width", 1)
            .set("d", axes);
        self.document.append(axes);

        for i in 0..TICKS {
            let t = i as f64 / (TICKS - 1) as f64;

            let x_value = b.min_x + t * (b.max_x - b.min_x);
            let (x, _) = self.to_canvas(&[x_value, b.min_y], b);
            self.draw_tick((x, bottom), (x, bottom + 6.0));
            self.draw_text(
                x,
                bottom + self.s.font_size * 1.5,
                &tick_label(x_value),
                "middle",
                None,
            );

            let y_value = b.min_y + t * (b.max_y - b.min_y);
            let (_, y) = self.to_canvas(&[b.min_x, y_value], b);
            self.draw_tick((left - 6.0, y), (left, y));
            self.draw_text(
                left - 8.0,
                y + self.s.font_size / 3.0,
                &tick_label(y_value),
                "end",
                None,
            );
        }
    }

    fn draw_tick(&mut self, from: (f32, f32), to: (f32, f32)) {
        let tick = Path::new()
            .set("stroke", self.s.color.as_str())
            .set("stroke-width", 1)
            .set("d", Data::new().move_to(from).line_to(to));
        self.document.append(tick);
    }

    fn draw_text(&mut self, x: f32, y: f32, text: &str, anchor: &str, rotate: Option<i32>) {
        let mut element = Element::new("text");
        element.assign("x", x);
        element.assign("y", y);
        element.assign("fill", self.s.color.as_str());
        element.assign("font-size", format!("{}px", self.s.font_size));
        element.assign("text-anchor", anchor);
        if let Some(deg) = rotate {
            element.assign("transform", format!("rotate({deg} {x} {y})"));
        }
        element.append(Text::new(text));
        self.document.append(element);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_bounds_are_widened() {
        let b = Bounds::from_points(&[[1.0, 0.5]]).unwrap();
        assert_eq!(0.5, b.min_x);
        assert_eq!(1.5, b.max_x);
        assert_eq!(0.0, b.min_y);
        assert_eq!(1.0, b.max_y);
        assert_eq!(None, Bounds::from_points(&[]));
    }

    #[test]
    fn one_marker_per_point() {
        let mut graph = ScatterGraph::new(GraphArgs::default());
        graph.draw_graph(
            "Haplotype frequencies",
            "rank",
            "frequency",
            &[[1.0, 0.5], [2.0, 0.3], [3.0, 0.2]],
        );
        let svg = graph.document.to_string();
        assert_eq!(3, svg.matches("<circle").count());
        assert!(svg.contains("Haplotype frequencies"));
    }

    #[test]
    fn log_axes_are_labelled() {
        let mut graph = ScatterGraph::new(GraphArgs {
            log_y: true,
            ..Default::default()
        });
        graph.draw_graph("Epsilon", "iteration", "epsilon", &[]);
        let svg = graph.document.to_string();
        assert!(svg.contains("log10(epsilon)"));
        assert!(svg.contains("No data"));
        assert_eq!(0, svg.matches("<circle").count());
    }
}
