//! xmlforge core library
//!
//! Learns an XML-to-XML transformation from example pairs: an analyzer
//! proposes mapping rules, a generator turns them into an xform program, and
//! the sandbox engine decides mechanically whether that program reproduces
//! every expected output. Failures are compiled into feedback for the next
//! iteration.

pub mod collaborator;
pub mod compare;
pub mod config;
pub mod domain;
pub mod fakes;
pub mod feedback;
pub mod obs;
pub mod orchestrator;
pub mod registry;
pub mod sandbox;
pub mod service;
pub mod telemetry;

pub use collaborator::{
    Analyzer, CollaboratorError, CollaboratorResult, Collaborators, Generator, HttpAnalyzer,
    HttpGenerator, HttpTester, LocalTester, Service, ServiceClient, Tester,
};

pub use compare::{compare, diff_report, Comparison, Difference};

pub use config::{ConfigError, ForgeConfig, TesterMode};

pub use domain::{
    pairs_from_lists, CandidateCode, DocumentPair, FieldMapping, ForgeError, Job, JobOptions,
    JobStatus, JobSummary, Result, RuleSet, ScoreDetail, ScoreResult, SourceDigest,
    TransformationRule,
};

pub use orchestrator::Orchestrator;
pub use registry::{JobRegistry, JobSlot};
pub use sandbox::{SandboxEngine, SandboxError, SandboxPolicy};
pub use service::JobService;
pub use telemetry::init_tracing;
