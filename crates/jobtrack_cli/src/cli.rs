use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use jobtrack_core::{IngestScope, JobRequest};
use jobtrack_engine::{EngineConfig, DEFAULT_BASE_URL};
use jobtrack_logging::{LogDestination, DEFAULT_LOG_FILE};
use log::LevelFilter;

/// Start a job on the job runner and track it until it settles.
#[derive(Debug, Parser)]
#[command(name = "jobtrack", version)]
pub(crate) struct Args {
    /// Root URL of the job runner API.
    #[arg(long, env = "JOBTRACK_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Directory holding the persisted document state.
    #[arg(long, env = "JOBTRACK_STATE_DIR", default_value = ".")]
    pub state_dir: PathBuf,

    /// Override the interval between status polls.
    #[arg(long, value_name = "MS")]
    pub poll_interval_ms: Option<u64>,

    /// Track every job by polling only.
    #[arg(long)]
    pub no_push: bool,

    #[arg(long, value_enum, default_value_t = LogTarget::Terminal)]
    pub log: LogTarget,

    /// Log debug output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Id of the target resource.
    pub target: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Discover references for the target.
    Identify,
    /// Ingest every pending reference, or reingest a single one.
    Ingest {
        #[arg(long, value_name = "ID")]
        reference: Option<String>,
    },
    /// Generate document sections.
    Populate {
        /// Section label to generate; repeat for several.
        #[arg(long = "section", value_name = "LABEL")]
        sections: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum LogTarget {
    Terminal,
    File,
    Both,
}

impl Args {
    pub fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::default().with_base_url(self.base_url.clone());
        if let Some(ms) = self.poll_interval_ms {
            config = config.with_poll_interval(Duration::from_millis(ms));
        }
        if self.no_push {
            config = config.polling_only();
        }
        config
    }

    pub fn request(&self) -> JobRequest {
        match &self.command {
            Command::Identify => JobRequest::Identify,
            Command::Ingest { reference: None } => JobRequest::Ingest {
                scope: IngestScope::All,
            },
            Command::Ingest {
                reference: Some(id),
            } => JobRequest::Ingest {
                scope: IngestScope::Single(id.clone()),
            },
            Command::Populate { sections } => JobRequest::Populate {
                sections: sections.clone(),
            },
        }
    }

    pub fn log_destination(&self) -> LogDestination {
        match self.log {
            LogTarget::Terminal => LogDestination::Terminal,
            LogTarget::File => LogDestination::File(PathBuf::from(DEFAULT_LOG_FILE)),
            LogTarget::Both => LogDestination::Both(PathBuf::from(DEFAULT_LOG_FILE)),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        if self.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobtrack_core::{JobKind, PollMode};
    use pretty_assertions::assert_eq;

    #[test]
    fn populate_collects_repeated_sections() {
        let args = Args::try_parse_from([
            "jobtrack", "T1", "populate", "--section", "Intro", "--section", "Methods",
        ])
        .unwrap();

        assert_eq!(
            args.request(),
            JobRequest::Populate {
                sections: vec!["Intro".into(), "Methods".into()],
            }
        );
    }

    #[test]
    fn ingest_with_reference_is_a_reingest() {
        let args = Args::try_parse_from(["jobtrack", "T2", "ingest", "--reference", "r7"]).unwrap();

        assert_eq!(
            args.request(),
            JobRequest::Ingest {
                scope: IngestScope::Single("r7".into()),
            }
        );
    }

    #[test]
    fn overrides_reach_every_policy() {
        let args = Args::try_parse_from([
            "jobtrack",
            "--base-url",
            "http://runner.local/api/",
            "--poll-interval-ms",
            "500",
            "--no-push",
            "T1",
            "identify",
        ])
        .unwrap();

        let config = args.engine_config();

        assert_eq!(config.base_url, "http://runner.local/api/");
        for kind in JobKind::ALL {
            let policy = config.policies.get(kind);
            assert_eq!(policy.push, None);
            assert_eq!(policy.primary.mode, PollMode::Primary);
            assert_eq!(policy.primary.interval, Duration::from_millis(500));
            assert_eq!(policy.confirmation.interval, Duration::from_millis(500));
        }
    }
}
