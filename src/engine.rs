// src/engine.rs

use std::sync::Arc;

use crate::db::ContactRepository;
use crate::matching::manager::DuplicateScanner;
use crate::merging::auto_merge::AutoMergeOrchestrator;
use crate::merging::executor::MergeExecutor;
use crate::utils::config::DedupConfig;

/// Scanner, merge executor and auto-merge orchestrator wired to one
/// repository and one configuration.
#[derive(Clone)]
pub struct DedupEngine {
    config: Arc<DedupConfig>,
    scanner: DuplicateScanner,
    executor: MergeExecutor,
    auto_merger: AutoMergeOrchestrator,
}

impl DedupEngine {
    pub fn new(repo: Arc<dyn ContactRepository>, config: DedupConfig) -> Self {
        let config = Arc::new(config);
        let scanner = DuplicateScanner::new(Arc::clone(&repo), Arc::clone(&config));
        let executor = MergeExecutor::new(repo, Arc::clone(&config));
        let auto_merger =
            AutoMergeOrchestrator::new(scanner.clone(), executor.clone(), Arc::clone(&config));
        Self {
            config,
            scanner,
            executor,
            auto_merger,
        }
    }

    pub fn config(&self) -> &DedupConfig {
        &self.config
    }

    pub fn scanner(&self) -> &DuplicateScanner {
        &self.scanner
    }

    pub fn executor(&self) -> &MergeExecutor {
        &self.executor
    }

    pub fn auto_merger(&self) -> &AutoMergeOrchestrator {
        &self.auto_merger
    }
}
