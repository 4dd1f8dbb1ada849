mod config;
mod dispatch;
mod error;
mod judge;
mod sandbox;
mod submission;

use anyhow::Result;
use tracing::{error, info};

use crate::config::ManagerConfig;
use crate::dispatch::ImageTable;
use crate::error::JudgeError;
use crate::judge::{JudgeRunner, Verdict};
use crate::sandbox::{DockerProvider, SandboxProvider};
use crate::submission::Submission;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("judge_manager=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    dotenvy::dotenv().ok();

    let Some(submission_path) = std::env::args().nth(1) else {
        eprintln!("Usage: judge-manager <submission.json>");
        std::process::exit(2);
    };

    let config = ManagerConfig::from_env()?;
    let images = config.image_table()?;

    // Everything up to dispatch happens before the runtime is contacted
    let (submission, image) = match load_and_dispatch(&submission_path, &images).await {
        Ok(dispatched) => dispatched,
        Err(e) => {
            println!("Error: {}", e);
            std::process::exit(1);
        }
    };
    info!(
        "Loaded submission {} (task_type={}, {} fields), judging with {}",
        submission_path,
        submission.task().task_type(),
        submission.fields().len(),
        image
    );

    let provider = DockerProvider::connect().await?;
    let verdict = match judge(&provider, &image, &submission, &config).await {
        Ok(verdict) => verdict,
        Err(e) => {
            error!("Judge run failed at {} stage", e.stage());
            return Err(e.into());
        }
    };

    report(&verdict)
}

async fn load_and_dispatch(path: &str, images: &ImageTable) -> Result<(Submission, String), JudgeError> {
    let submission = Submission::from_file(path).await?;
    let image = images.resolve(submission.task())?;
    Ok((submission, image))
}

async fn judge<P>(
    provider: &P,
    image: &str,
    submission: &Submission,
    config: &ManagerConfig,
) -> Result<Verdict, JudgeError>
where
    P: SandboxProvider + ?Sized,
{
    JudgeRunner::new(provider)
        .with_wait_timeout(config.wait_timeout)
        .run(image, submission)
        .await
}

fn report(verdict: &Verdict) -> Result<()> {
    match verdict {
        Verdict::Completed(result) => {
            if let Some(summary) = verdict.summary() {
                info!(
                    "Feedback: status={}, score={}, tests={}, message={}",
                    summary.status,
                    summary.total_score,
                    summary.tests,
                    summary.message.as_deref().unwrap_or("-")
                );
            }
            println!("{}", serde_json::to_string_pretty(result)?);
        }
        Verdict::Failed { exit_code, output } => {
            println!("{}", output);
            println!("Judge exited with non-zero exit code {}", exit_code);
        }
    }
    Ok(())
}
