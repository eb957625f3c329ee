//! Pipeline stages: C4 analyser, C5 template registry, C6 content generator, and the
//! C9 orchestrator that sequences them per job type.
pub mod analyser;
pub mod generator;
pub mod orchestrator;
pub mod templates;

pub use analyser::Analyser;
pub use generator::ContentGenerator;
pub use orchestrator::PipelineOrchestrator;
pub use templates::TemplateRegistry;
