/// Frequency-vs-rank and epsilon-vs-iteration scatter plots
pub mod scatter_graph;

pub use scatter_graph::ScatterGraph;
