use std::{path::Path, process, sync::Arc};

use pagesmith::{
    application::{
        error::AppError,
        generator::StaticPageGenerator,
        notify::{NotificationDispatcher, NotificationWorker},
        publish::{PublishOrchestrator, PublishSettings},
        repos::{ArtifactGenerator, ContentStore, EvaluationSink},
        store::ContentStoreClient,
        tasks::TaskService,
    },
    config::{self, GeneratorBackend},
    infra::{
        error::InfraError,
        github::GitHubContentStore,
        http::{self, HttpState},
        llm::ChatCompletionGenerator,
        notify::HttpEvaluationSink,
        telemetry,
    },
};
use pagesmith_api_types::{TaskAcceptedResponse, TaskPayload};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Publish(args) => run_publish(settings, &args.file).await,
    }
}

struct ApplicationContext {
    tasks: Arc<TaskService>,
    worker: NotificationWorker,
}

fn build_application_context(settings: &config::Settings) -> Result<ApplicationContext, AppError> {
    let store: Arc<dyn ContentStore> = Arc::new(GitHubContentStore::new(&settings.github)?);
    let generator: Arc<dyn ArtifactGenerator> = match settings.generator.backend {
        GeneratorBackend::Static => Arc::new(StaticPageGenerator),
        GeneratorBackend::OpenAi => Arc::new(ChatCompletionGenerator::new(&settings.generator)?),
    };
    let sink: Arc<dyn EvaluationSink> = Arc::new(HttpEvaluationSink::new(settings.notify.timeout)?);

    let client = ContentStoreClient::new(store, settings.github.branch.clone());
    let orchestrator = Arc::new(PublishOrchestrator::new(
        client,
        generator,
        PublishSettings {
            owner: settings.github.owner.clone(),
            pages_domain: settings.github.pages_domain.clone(),
            license_holder: settings.publish.license_holder.clone(),
        },
    ));

    let (dispatcher, worker) = NotificationDispatcher::spawn(sink);
    let tasks = Arc::new(TaskService::new(
        settings.auth.secret.clone(),
        orchestrator,
        dispatcher,
    ));

    info!(
        target = "pagesmith::bootstrap",
        owner = %settings.github.owner,
        branch = %settings.github.branch,
        generator = ?settings.generator.backend,
        "application context ready"
    );

    Ok(ApplicationContext { tasks, worker })
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let ApplicationContext { tasks, worker } = build_application_context(&settings)?;

    let router = http::build_router(HttpState::new(tasks));
    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "pagesmith::serve",
        addr = %settings.server.addr,
        "listening"
    );

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    // The router (and with it every dispatcher handle) is gone once serve returns.
    worker.drain(settings.server.graceful_shutdown).await;
    Ok(())
}

async fn run_publish(settings: config::Settings, file: &Path) -> Result<(), AppError> {
    let raw = tokio::fs::read(file)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    let payload: TaskPayload = serde_json::from_slice(&raw).map_err(|err| {
        AppError::validation(format!("{} is not a task document: {err}", file.display()))
    })?;

    let ApplicationContext { tasks, worker } = build_application_context(&settings)?;
    let outcome = tasks.handle(payload).await;
    drop(tasks);
    worker.drain(settings.notify.timeout).await;

    let accepted = outcome.map_err(|err| AppError::unexpected(err.to_string()))?;
    let response = TaskAcceptedResponse {
        status: "success".to_string(),
        repo: accepted.repo,
    };
    let rendered = serde_json::to_string_pretty(&response)
        .map_err(|err| AppError::unexpected(err.to_string()))?;
    println!("{rendered}");

    info!(
        target = "pagesmith::publish",
        repo = %accepted.result.repo_url,
        commit = %accepted.result.commit_sha,
        pages = %accepted.result.pages_url,
        "task published"
    );
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(
            target = "pagesmith::serve",
            error = %err,
            "failed to listen for shutdown signal"
        );
        std::future::pending::<()>().await;
    }
    info!(target = "pagesmith::serve", "shutdown signal received");
}
