//! rexia-flow - command line entry point
//!
//! Routes a task to the base or complex model and runs it through a workflow.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use rexia_flow::llm::{LlmClient, Model, OpenAiCompatibleClient};
use rexia_flow::sandbox::{TestSuite, ToolRunner};
use rexia_flow::tools::{RunPython, ToolRegistry};
use rexia_flow::{
    Agent, Config, InMemoryPlanStore, TaskAgent, TaskComplexityRouter, WorkflowKind, WorkingMemory,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(
    name = "rexia-flow",
    version,
    about = "Run a task through collaborating LLM workers"
)]
struct Args {
    /// The task to complete
    task: String,

    /// Workflow: simple, simple_tool, collaboration, code, code_tool, tdd, reflect, task_breakdown
    #[arg(short, long, default_value = "simple", value_parser = parse_kind)]
    workflow: WorkflowKind,

    /// Python file with the unittest class for the tdd workflow
    #[arg(long, requires = "test_class")]
    tests: Option<PathBuf>,

    /// Name of the unittest class inside --tests
    #[arg(long)]
    test_class: Option<String>,

    /// Skip complexity routing and use the base model
    #[arg(long)]
    no_route: bool,
}

fn parse_kind(value: &str) -> Result<WorkflowKind, String> {
    WorkflowKind::parse(value).ok_or_else(|| format!("unknown workflow '{}'", value))
}

fn main() -> anyhow::Result<()> {
    // Sandbox runs and nested workflow futures get a larger worker stack.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_stack_size(8 * 1024 * 1024)
        .build()?;
    runtime.block_on(async_main())
}

async fn async_main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rexia_flow=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    info!(
        "Loaded configuration: base={} complex={} router={}",
        config.models.base_model, config.models.complex_model, config.models.router_model
    );

    let client: Arc<dyn LlmClient> = Arc::new(OpenAiCompatibleClient::new(
        &config.base_url,
        config.api_key.clone(),
    ));
    let tools = Arc::new(
        ToolRegistry::empty().with_tool(Arc::new(RunPython::new(ToolRunner::new(
            config.sandbox.clone(),
        )))),
    );
    let model = |name: &str| {
        let model = Model::new(client.clone(), name)
            .with_options(config.chat_options())
            .with_verbose(config.verbose);
        if matches!(args.workflow, WorkflowKind::SimpleTool) {
            model.with_tools(tools.clone())
        } else {
            model
        }
    };

    let router = TaskComplexityRouter::new(
        model(&config.models.base_model),
        model(&config.models.complex_model),
        model(&config.models.router_model),
    )
    .with_threshold(config.models.complexity_threshold);

    let selected = if args.no_route {
        router.model(rexia_flow::ModelTier::Base)
    } else {
        router.model_for(&args.task).await
    };

    let mut options = config.workflow_options();
    options.plan_store = Some(Arc::new(InMemoryPlanStore::new()));
    if let (Some(path), Some(class_name)) = (&args.tests, &args.test_class) {
        let source = tokio::fs::read_to_string(path).await?;
        options.test_suite = Some(TestSuite::new(class_name.clone(), source)?);
    }

    info!("Running the {} workflow on {}", args.workflow, selected.name());
    let mut agent = Agent::with_kind(args.workflow, &args.task, selected, &options)
        .with_memory(WorkingMemory::new(config.working_memory_size));
    let answer = agent.invoke(&args.task).await?;
    println!("{}", answer);

    Ok(())
}
