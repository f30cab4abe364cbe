/// Error taxonomy shared by every stage.
pub mod error;
/// Deterministic file naming for every artifact of a run.
pub mod layout;
