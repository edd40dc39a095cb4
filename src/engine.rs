pub mod labels;
pub mod pareto;
pub mod raptor;
