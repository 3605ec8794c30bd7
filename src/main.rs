//! pingone-provider CLI entrypoint.
//!
//! This is the main entrypoint for the pingone-provider command-line tool.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use colored::Colorize;
use pingone_provider::cli::{Cli, Commands, LogFormat, OutputFormatter, StateCommands};
use pingone_provider::config::{
    Address, ConfigParser, ConfigValidator, DEFAULT_DOCUMENT_FILE, DependencyGraph, DeployDocument, ENV_ACCESS_TOKEN,
    ProviderConfig, find_config_file, load_dotenv,
};
use pingone_provider::error::{PlanError, ProviderError, Result, StateError};
use pingone_provider::framework::Diagnostics;
use pingone_provider::planner::{ExecutionResult, Planner};
use pingone_provider::reconciler::Reconciler;
use pingone_provider::resource::Provider;
use pingone_provider::sdk::OpContext;
use pingone_provider::state::{LocalStateStore, StateStore};

use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose, cli.log_format);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {e}", "Error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system. Logs go to stderr so stdout carries only
/// command output.
fn init_logging(verbose: bool, format: LogFormat) {
    let default = if verbose { "pingone_provider=debug" } else { "pingone_provider=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);
    let ctx = OpContext::new();
    let cancel = ctx.cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; cancelling pending retries");
            cancel.cancel();
        }
    });

    let session = Session {
        file: cli.file,
        state_dir: cli.state_dir,
        formatter,
        ctx,
    };

    match cli.command {
        Commands::Validate => session.cmd_validate(),
        Commands::Plan => session.cmd_plan().await,
        Commands::Apply {
            auto_approve,
            continue_on_error,
        } => session.cmd_apply(auto_approve, continue_on_error).await,
        Commands::Refresh => session.cmd_refresh().await,
        Commands::Drift => session.cmd_drift().await,
        Commands::Import { address, id } => session.cmd_import(&address, &id).await,
        Commands::Destroy { auto_approve } => session.cmd_destroy(auto_approve).await,
        Commands::State { command } => session.cmd_state(command).await,
        Commands::Schema { type_name } => session.cmd_schema(type_name.as_deref()),
    }
}

/// Settings shared by every command.
struct Session {
    file: PathBuf,
    state_dir: PathBuf,
    formatter: OutputFormatter,
    ctx: OpContext,
}

/// A loaded document with its provider and state store.
struct Workspace {
    document: DeployDocument,
    provider: Provider,
    store: Box<dyn StateStore>,
}

impl Session {
    /// Validates the document offline.
    fn cmd_validate(&self) -> Result<()> {
        let (document, dir) = self.load_document()?;
        let provider = offline_provider(&dir)?;
        let structural = ConfigValidator::new(provider.resource_types(), provider.data_source_types())
            .validate(&document)?;
        for warning in &structural.warnings {
            eprintln!("{}", self.formatter.warning(warning));
        }

        let graph = DependencyGraph::build(&document)?;
        let found = Planner::new(&provider).validate(&document, &graph)?;
        let mut errors = 0;
        for entry in &found {
            errors += entry.diagnostics.error_count();
            print!(
                "{}",
                self.formatter
                    .format_diagnostics(&entry.diagnostics, Some(&entry.address.to_string()))
            );
        }
        fail_on_errors(errors)?;

        println!(
            "{}",
            self.formatter.success(&format!(
                "The document is valid ({} resource(s), {} data source(s)).",
                document.resources.len(),
                document.data.len()
            ))
        );
        Ok(())
    }

    /// Shows the deployment plan.
    async fn cmd_plan(&self) -> Result<()> {
        let workspace = self.load_workspace()?;
        let reconciler = self.reconciler(&workspace);
        let (plan, _) = reconciler.plan().await?;
        print!("{}", self.formatter.format_plan(&plan));
        fail_on_errors(plan.error_count())
    }

    /// Plans, confirms and applies.
    async fn cmd_apply(&self, auto_approve: bool, continue_on_error: bool) -> Result<()> {
        let workspace = self.load_workspace()?;
        let reconciler = self.reconciler(&workspace).with_continue_on_error(continue_on_error);
        let (plan, state) = reconciler.plan().await?;
        print!("{}", self.formatter.format_plan(&plan));
        fail_on_errors(plan.error_count())?;

        if !plan.has_changes() {
            return Ok(());
        }
        if !auto_approve && !confirm("Do you want to apply this plan? [y/N]: ", "y")? {
            eprintln!("Apply cancelled.");
            return Ok(());
        }

        let result = reconciler.apply(&plan, &state).await?;
        self.finish(&result)
    }

    /// Writes the platform's values to state.
    async fn cmd_refresh(&self) -> Result<()> {
        let workspace = self.load_workspace()?;
        let report = self.reconciler(&workspace).refresh().await?;
        print!("{}", self.formatter.format_drift(&report));
        fail_on_errors(report.error_count())
    }

    /// Reports drift without writing state.
    async fn cmd_drift(&self) -> Result<()> {
        let workspace = self.load_workspace()?;
        let report = self.reconciler(&workspace).check_drift().await?;
        print!("{}", self.formatter.format_drift(&report));
        fail_on_errors(report.error_count())
    }

    /// Imports an existing object.
    async fn cmd_import(&self, address: &str, id: &str) -> Result<()> {
        let address = parse_address(address)?;
        let workspace = self.load_workspace()?;
        let diagnostics = self.reconciler(&workspace).import(&address, id).await?;
        self.report(&diagnostics, &address.to_string())?;
        println!("{}", self.formatter.success(&format!("Imported {address}.")));
        Ok(())
    }

    /// Deletes every managed resource.
    async fn cmd_destroy(&self, auto_approve: bool) -> Result<()> {
        let workspace = self.load_workspace()?;
        let reconciler = self.reconciler(&workspace);
        let (plan, state) = reconciler.plan_destroy().await?;
        print!("{}", self.formatter.format_plan(&plan));
        if !plan.has_changes() {
            return Ok(());
        }

        if !auto_approve
            && !confirm(
                "This deletes every managed resource. Type 'destroy' to confirm: ",
                "destroy",
            )?
        {
            eprintln!("Destroy cancelled.");
            return Ok(());
        }

        let result = reconciler.apply(&plan, &state).await?;
        self.finish(&result)
    }

    /// State inspection and editing.
    async fn cmd_state(&self, command: StateCommands) -> Result<()> {
        let store = LocalStateStore::with_base_dir(self.state_dir());
        match command {
            StateCommands::List => {
                let state = store.load().await?.unwrap_or_default();
                print!("{}", self.formatter.format_state_list(&state));
            }
            StateCommands::Show { address } => {
                let state = store.load().await?.unwrap_or_default();
                let entry = state
                    .get(&address)
                    .ok_or_else(|| StateError::ResourceNotFound { address: address.clone() })?;
                print!("{}", self.formatter.format_state_entry(&address, entry));
            }
            StateCommands::Rm { address } => {
                let workspace = Workspace {
                    document: DeployDocument::default(),
                    provider: offline_provider(Path::new("."))?,
                    store: Box::new(store),
                };
                let removed = self.reconciler(&workspace).forget(&address).await?;
                info!("Removed {address} ({}) from state", removed.type_name);
                println!(
                    "{}",
                    self.formatter
                        .success(&format!("Removed {address} from state. The object itself was not deleted."))
                );
            }
        }
        Ok(())
    }

    /// Prints schemas.
    fn cmd_schema(&self, type_name: Option<&str>) -> Result<()> {
        let provider = offline_provider(Path::new("."))?;
        let Some(type_name) = type_name else {
            print!(
                "{}",
                self.formatter
                    .format_type_list(provider.resource_types(), provider.data_source_types())
            );
            return Ok(());
        };

        let schema = provider
            .resource(type_name)
            .map(|r| r.schema())
            .or_else(|| provider.data_source(type_name).map(|d| d.schema()))
            .ok_or_else(|| {
                ProviderError::Config(pingone_provider::error::ConfigError::UnknownType {
                    kind: String::from("resource or data source"),
                    type_name: type_name.to_string(),
                })
            })?;
        print!("{}", self.formatter.format_schema(type_name, schema));
        Ok(())
    }

    // ========================================================================
    // Helper Functions
    // ========================================================================

    fn reconciler<'a>(&self, workspace: &'a Workspace) -> Reconciler<'a, Box<dyn StateStore>> {
        Reconciler::new(&workspace.provider, &workspace.document, &workspace.store).with_context(self.ctx.clone())
    }

    /// Prints an execution result and turns failures into an error.
    fn finish(&self, result: &ExecutionResult) -> Result<()> {
        print!("{}", self.formatter.format_execution(result));
        fail_on_errors(result.error_count().max(result.failed))
    }

    /// Prints diagnostics and turns errors into an error.
    fn report(&self, diagnostics: &Diagnostics, address: &str) -> Result<()> {
        if !diagnostics.is_empty() {
            print!("{}", self.formatter.format_diagnostics(diagnostics, Some(address)));
        }
        fail_on_errors(diagnostics.error_count())
    }

    /// Resolves the document path. The default name is searched for in
    /// parent directories too.
    fn document_path(&self) -> Result<PathBuf> {
        if self.file.exists() || self.file != Path::new(DEFAULT_DOCUMENT_FILE) {
            Ok(self.file.clone())
        } else {
            find_config_file(".")
        }
    }

    /// Loads the document and its `.env`.
    fn load_document(&self) -> Result<(DeployDocument, PathBuf)> {
        let path = self.document_path()?;
        debug!("Loading document from: {}", path.display());
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();
        load_dotenv(&dir)?;
        Ok((ConfigParser::new().load_file(&path)?, dir))
    }

    /// Loads the document, connects the provider and opens state.
    fn load_workspace(&self) -> Result<Workspace> {
        let (document, _) = self.load_document()?;
        let config = ProviderConfig::from_env()?.with_region(document.provider.region_code);
        let provider = Provider::from_config(&config)?;
        ConfigValidator::new(provider.resource_types(), provider.data_source_types()).validate(&document)?;

        let store: Box<dyn StateStore> = Box::new(LocalStateStore::with_base_dir(self.state_dir()));
        Ok(Workspace {
            document,
            provider,
            store,
        })
    }

    fn state_dir(&self) -> PathBuf {
        self.state_dir.clone()
    }
}

/// A provider for commands that never call the platform. Credentials are
/// not required.
fn offline_provider(dir: &Path) -> Result<Provider> {
    load_dotenv(dir)?;
    let config = ProviderConfig::from_lookup(|name| {
        std::env::var(name)
            .ok()
            .or_else(|| (name == ENV_ACCESS_TOKEN).then(|| String::from("offline")))
    })?;
    Provider::from_config(&config)
}

fn parse_address(text: &str) -> Result<Address> {
    Address::parse(text).ok_or_else(|| {
        ProviderError::Config(pingone_provider::error::ConfigError::validation(
            format!("'{text}' is not an address; expected <type>.<name>"),
            "address",
        ))
    })
}

/// Converts a count of error diagnostics into the command's result.
fn fail_on_errors(count: usize) -> Result<()> {
    if count == 0 {
        Ok(())
    } else {
        Err(PlanError::Diagnostics { count }.into())
    }
}

/// Asks for confirmation on stderr; true when the answer is `expected`.
fn confirm(prompt: &str, expected: &str) -> Result<bool> {
    eprint!("{prompt}");
    std::io::stderr().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case(expected))
}
