use boardsight_core::config::{AppConfig, LoadOptions};
use boardsight_core::Board;
use serde::Serialize;

use crate::commands::{CommandResult, EXIT_CONFIG, EXIT_OK};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

/// Offline readiness checks; nothing here touches the network.
pub fn run(options: &LoadOptions, json_output: bool) -> CommandResult {
    let report = build_report(options);
    let exit_code = if report.overall_status == CheckStatus::Pass { EXIT_OK } else { EXIT_CONFIG };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report(options: &LoadOptions) -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(options.clone()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_monday_credentials(&config));
            checks.push(check_board_ids(&config));
            checks.push(check_llm_credentials(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["monday_credentials", "board_ids", "llm_credentials"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_monday_credentials(config: &AppConfig) -> DoctorCheck {
    match config.monday.require_api_key() {
        Ok(_) => DoctorCheck {
            name: "monday_credentials",
            status: CheckStatus::Pass,
            details: "monday.com API key is configured".to_string(),
        },
        Err(error) => DoctorCheck {
            name: "monday_credentials",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

fn check_board_ids(config: &AppConfig) -> DoctorCheck {
    let missing: Vec<&str> = Board::ALL
        .into_iter()
        .filter(|board| config.monday.board_id(*board).is_err())
        .map(|board| board.display_name())
        .collect();

    if missing.is_empty() {
        DoctorCheck {
            name: "board_ids",
            status: CheckStatus::Pass,
            details: "deals and work orders board ids are configured".to_string(),
        }
    } else {
        DoctorCheck {
            name: "board_ids",
            status: CheckStatus::Fail,
            details: format!("missing board id for: {}", missing.join(", ")),
        }
    }
}

fn check_llm_credentials(config: &AppConfig) -> DoctorCheck {
    match config.llm.require_api_key() {
        Ok(Some(_)) => DoctorCheck {
            name: "llm_credentials",
            status: CheckStatus::Pass,
            details: format!("{:?} key configured for model `{}`", config.llm.provider, config.llm.model),
        },
        Ok(None) => DoctorCheck {
            name: "llm_credentials",
            status: CheckStatus::Pass,
            details: format!("{:?} needs no API key ({})", config.llm.provider, config.llm.base_url()),
        },
        Err(error) => DoctorCheck {
            name: "llm_credentials",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
