pub mod garch;
pub mod hmm;
pub mod optimizer;
