use async_trait::async_trait;
use pipewright::prelude::*;
use pipewright::{init_logging, StoreConfig};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

struct Analyze;

#[async_trait]
impl OperationHandler for Analyze {
    async fn execute(&self, params: &Params, ctx: &mut OperationContext) -> Result<Value, HandlerError> {
        let repo = str_param(params, "repo_path")?;
        ctx.report(format!("Analyzing {repo}"));
        Ok(json!({"language": "go", "port": 8080}))
    }

    fn input_contract(&self) -> InputContract {
        InputContract::required(&["repo_path"])
    }
}

struct GenerateDockerfile;

#[async_trait]
impl OperationHandler for GenerateDockerfile {
    async fn execute(&self, _params: &Params, ctx: &mut OperationContext) -> Result<Value, HandlerError> {
        let analysis = ctx.require_result(Operation::Analyze)?;
        let port = analysis["port"].as_u64().unwrap_or(80);
        Ok(json!({"dockerfile": format!("FROM golang:1.22\nEXPOSE {port}\n")}))
    }
}

struct FixDockerfile;

#[async_trait]
impl OperationHandler for FixDockerfile {
    async fn execute(&self, _params: &Params, ctx: &mut OperationContext) -> Result<Value, HandlerError> {
        ctx.set_metadata("dockerfileFixed", json!(true));
        Ok(json!({"patched": true}))
    }
}

/// Fails until the Dockerfile has been repaired.
struct Build {
    broken: AtomicBool,
}

#[async_trait]
impl OperationHandler for Build {
    async fn execute(&self, _params: &Params, ctx: &mut OperationContext) -> Result<Value, HandlerError> {
        if ctx.get_metadata("dockerfileFixed").is_some() {
            self.broken.store(false, Ordering::SeqCst);
        }
        if self.broken.load(Ordering::SeqCst) {
            return Err(HandlerError::failed("COPY failed: go.sum not found"));
        }
        Ok(json!({"image": "app:latest"}))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let router = Router::builder()
        .store(Arc::new(MemorySessionStore::with_config(StoreConfig::default())))
        .register(Operation::Analyze, Analyze)
        .register(Operation::GenerateDockerfile, GenerateDockerfile)
        .register(Operation::FixDockerfile, FixDockerfile)
        .register(
            Operation::Build,
            Build {
                broken: AtomicBool::new(true),
            },
        )
        .build()?;

    for operation in ["build", "fix-dockerfile", "build"] {
        let outcome = router
            .route(RouteRequest::new(operation).param("repo_path", "/src/app"))
            .await;
        println!("{}", serde_json::to_string_pretty(&outcome.to_payload())?);
    }

    Ok(())
}
