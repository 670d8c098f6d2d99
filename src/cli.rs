// LogDeck - cli.rs
//
// Command-line presentation layer. Parses commands, applies the login
// guard, drives the stores and managers, and prints results.

use clap::{Args, Parser, Subcommand};
use logdeck::app::api::{ApiClient, ProjectApi};
use logdeck::app::auth;
use logdeck::app::creation::CreationManager;
use logdeck::app::poller::{DashboardStatusSource, PollManager, ProjectStatusSource, StatusSource};
use logdeck::app::store::ProjectStore;
use logdeck::core::model::{
    CreationEvent, PollProgress, Project, ProjectStatus, UpdateProfileRequest, UpdateProjectRequest,
    WatchedEntity,
};
use logdeck::core::wizard;
use logdeck::util::constants::{MAX_PAGE_SIZE, WIZARD_STEP_COUNT};
use logdeck::util::error::{CreationError, LogDeckError};
use std::cell::Cell;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

/// LogDeck - configure log-collection projects and watch their dashboards.
#[derive(Parser, Debug)]
#[command(name = "logdeck", version, about)]
pub struct Cli {
    /// Directory holding config.toml and auth-storage.json.
    #[arg(long = "config-dir", global = true)]
    pub config_dir: Option<PathBuf>,

    /// Backend base URL (overrides LOGDECK_API_BASE_URL and config.toml).
    #[arg(long = "api-url", global = true)]
    pub api_url: Option<String>,

    /// Enable debug logging (equivalent to RUST_LOG=debug).
    #[arg(short = 'd', long = "debug", global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Log in with email and password.
    Login {
        #[arg(long)]
        email: String,
        /// Read from stdin when omitted.
        #[arg(long)]
        password: Option<String>,
    },
    /// Create an account and log in.
    Signup {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: Option<String>,
    },
    /// Log in with a Google ID token.
    LoginGoogle {
        #[arg(long)]
        token: String,
    },
    /// Log in with a GitHub authorization code.
    LoginGithub {
        #[arg(long)]
        code: String,
    },
    /// Log out and forget stored credentials.
    Logout,
    /// Show the logged-in user.
    Whoami,
    /// Manage projects.
    #[command(subcommand)]
    Projects(ProjectsCommand),
    /// Watch dashboard generation.
    #[command(subcommand)]
    Dashboards(DashboardsCommand),
    /// Show or edit your profile.
    #[command(subcommand)]
    Profile(ProfileCommand),
}

#[derive(Subcommand, Debug)]
pub enum ProjectsCommand {
    /// List projects, one page at a time.
    List {
        #[arg(long)]
        page: Option<u32>,
        #[arg(long = "page-size", value_parser = clap::value_parser!(u32).range(1..=MAX_PAGE_SIZE as i64))]
        page_size: Option<u32>,
        /// Keep polling until every listed project is READY or FAILED.
        #[arg(long)]
        watch: bool,
    },
    /// Show one project.
    Show {
        id: String,
        /// Also request a dashboard link for it.
        #[arg(long = "dashboard-link")]
        dashboard_link: bool,
    },
    /// Change a project's name or description.
    Update(UpdateArgs),
    /// Delete a project.
    Delete { id: String },
    /// Poll the given projects' dashboard status until they finish.
    Status {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Create a project from a wizard definition file.
    Create {
        #[arg(long)]
        file: PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    pub id: String,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum DashboardsCommand {
    /// Poll dashboard generation until nothing is in progress.
    Watch,
}

#[derive(Subcommand, Debug)]
pub enum ProfileCommand {
    Show,
    /// Change your display name or bio.
    Update {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        bio: Option<String>,
    },
    /// Change your password. Both values are read from stdin.
    ChangePassword,
}

/// Everything a command needs.
pub struct Context {
    pub client: Arc<ApiClient>,
    pub poll_interval: Duration,
}

impl Context {
    fn api(&self) -> Arc<dyn ProjectApi> {
        self.client.clone()
    }

    /// Route guard for commands that need a logged-in user.
    fn require_login(&self) -> Result<(), LogDeckError> {
        if self.client.auth().is_authenticated() {
            Ok(())
        } else {
            Err(LogDeckError::NotAuthenticated)
        }
    }
}

pub fn run(command: Command, ctx: &Context) -> Result<(), LogDeckError> {
    match command {
        Command::Login { email, password } => {
            let password = password_or_prompt(password, "Password")?;
            let user = auth::login(&ctx.client, &email, &password)?;
            println!("Logged in as {} <{}>", user.name, user.email);
        }
        Command::Signup {
            name,
            email,
            password,
        } => {
            let password = password_or_prompt(password, "Password")?;
            let user = auth::signup(&ctx.client, &name, &email, &password)?;
            println!("Account created; logged in as {} <{}>", user.name, user.email);
        }
        Command::LoginGoogle { token } => {
            let user = auth::login_google(&ctx.client, &token)?;
            println!("Logged in as {} <{}>", user.name, user.email);
        }
        Command::LoginGithub { code } => {
            let user = auth::login_github(&ctx.client, &code)?;
            println!("Logged in as {} <{}>", user.name, user.email);
        }
        Command::Logout => {
            auth::logout(&ctx.client)?;
            println!("Logged out");
        }
        Command::Whoami => {
            ctx.require_login()?;
            let user = auth::me(&ctx.client)?;
            println!("{} <{}> (id {})", user.name, user.email, user.id);
        }
        Command::Projects(cmd) => {
            ctx.require_login()?;
            run_projects(cmd, ctx)?;
        }
        Command::Dashboards(DashboardsCommand::Watch) => {
            ctx.require_login()?;
            watch_dashboards(ctx)?;
        }
        Command::Profile(cmd) => {
            ctx.require_login()?;
            match cmd {
                ProfileCommand::Show => {
                    let profile = ctx.client.get_profile()?;
                    println!("{} <{}>", profile.name, profile.email);
                    if let Some(bio) = profile.bio.filter(|b| !b.is_empty()) {
                        println!("  {bio}");
                    }
                }
                ProfileCommand::Update { name, bio } => {
                    let update = UpdateProfileRequest {
                        name,
                        bio,
                        avatar: None,
                    };
                    let profile = ctx.client.update_profile(&update)?;
                    println!("Profile updated: {} <{}>", profile.name, profile.email);
                }
                ProfileCommand::ChangePassword => {
                    let current = prompt("Current password")?;
                    let new = prompt("New password")?;
                    ctx.client.change_password(&current, &new)?;
                    println!("Password changed");
                }
            }
        }
    }
    Ok(())
}

// =============================================================================
// Projects
// =============================================================================

fn run_projects(cmd: ProjectsCommand, ctx: &Context) -> Result<(), LogDeckError> {
    let mut store = ProjectStore::new(ctx.api());
    match cmd {
        ProjectsCommand::List {
            page,
            page_size,
            watch,
        } => {
            store.fetch_projects(page, page_size)?;
            print_project_page(&store);
            if watch {
                watch_project_list(&mut store, ctx, page, page_size)?;
            }
        }
        ProjectsCommand::Show { id, dashboard_link } => {
            let project = store.fetch_project(&id)?.clone();
            print_project(&project);
            if dashboard_link {
                let link = store.generate_dashboard_link(&id)?;
                println!("  dashboard link: {}", link.dashboard_url);
            }
        }
        ProjectsCommand::Update(args) => {
            if args.name.is_none() && args.description.is_none() {
                println!("Nothing to update; pass --name and/or --description");
                return Ok(());
            }
            let update = UpdateProjectRequest {
                name: args.name,
                description: args.description,
            };
            let project = store.update_project(&args.id, &update)?;
            print_project(project);
        }
        ProjectsCommand::Delete { id } => {
            store.delete_project(&id)?;
            println!("Deleted project {id}");
        }
        ProjectsCommand::Status { ids } => {
            let mut entities = Vec::new();
            for id in &ids {
                entities.push(WatchedEntity::from(store.fetch_project(id)?));
            }
            let mut poller = PollManager::with_interval(
                ProjectStatusSource::new(ctx.api()),
                ctx.poll_interval,
            );
            if !poller.start(&entities) {
                for e in &entities {
                    println!("{}  {}  {}", e.id, e.status, e.name);
                }
                return Ok(());
            }
            watch_until_done(&mut poller, |_| {});
        }
        ProjectsCommand::Create { file } => create_project(&file, ctx)?,
    }
    Ok(())
}

fn watch_project_list(
    store: &mut ProjectStore,
    ctx: &Context,
    page: Option<u32>,
    page_size: Option<u32>,
) -> Result<(), LogDeckError> {
    let entities: Vec<WatchedEntity> =
        store.state().projects.iter().map(WatchedEntity::from).collect();
    let mut poller = PollManager::with_interval(
        ProjectStatusSource::new(ctx.api()),
        ctx.poll_interval,
    );
    let completed = Rc::new(Cell::new(false));
    let flag = Rc::clone(&completed);
    poller.on_complete(move |_| flag.set(true));

    if !poller.start(&entities) {
        println!("All listed projects are READY or FAILED.");
        return Ok(());
    }
    watch_until_done(&mut poller, |snapshot| {
        store.apply_polled(snapshot);
    });

    if completed.get() {
        // Authoritative refresh rather than trusting the polled snapshot.
        store.fetch_projects(page, page_size)?;
        print_project_page(store);
    }
    Ok(())
}

fn create_project(file: &std::path::Path, ctx: &Context) -> Result<(), LogDeckError> {
    let content = std::fs::read_to_string(file).map_err(|e| LogDeckError::Io {
        operation: "read wizard definition",
        source: e,
    })?;
    let mut session = wizard::parse_definition(&content, file)?.into_session()?;

    // Walk the steps the same way the interactive wizard does.
    for _ in 1..WIZARD_STEP_COUNT {
        let step = session.step();
        session.next_step()?;
        println!("  [{}/{}] {} ok", step.number(), WIZARD_STEP_COUNT, step.title());
    }

    let mut manager = CreationManager::new(ctx.api(), session);
    manager.submit()?;
    println!("Generating log collection setup...");

    loop {
        match wait_for_event(&mut manager) {
            Some(CreationEvent::ReadyToInstall {
                project_id,
                script_url,
            }) => {
                println!("Project {project_id} provisioned.");
                println!("Download and run the install script on the target host:");
                println!("  {script_url}");
                if !confirm("Press Enter once the script has been installed (or type q to stop): ")? {
                    println!("Stopped. Project {project_id} is waiting for dashboard generation.");
                    manager.cancel_to_form()?;
                    return Ok(());
                }
                manager.confirm_install()?;
                println!("Generating dashboard...");
            }
            Some(CreationEvent::Succeeded { route }) => {
                let project_id = manager
                    .phase()
                    .project_id()
                    .unwrap_or_default()
                    .to_string();
                println!("Project {project_id} created.");
                if route.dashboard_creating {
                    let name = manager.flow().session().name.clone();
                    follow_new_dashboard(ctx, project_id, name);
                }
                return Ok(());
            }
            Some(CreationEvent::Failed(err @ CreationError::Phase2(_)))
            | Some(CreationEvent::Failed(err @ CreationError::WorkerLost { .. }))
                if manager.phase().project_id().is_some() =>
            {
                eprintln!("{err}");
                if !confirm("Press Enter to retry dashboard generation (or type q to stop): ")? {
                    return Err(err.into());
                }
                manager.confirm_install()?;
                println!("Retrying dashboard generation...");
            }
            Some(CreationEvent::Failed(err)) => return Err(err.into()),
            None => {
                return Err(CreationError::WorkerLost {
                    phase: manager.phase().name(),
                }
                .into())
            }
        }
    }
}

fn wait_for_event(manager: &mut CreationManager) -> Option<CreationEvent> {
    while manager.flow().is_busy() {
        if let Some(event) = manager.wait(Duration::from_millis(250)) {
            return Some(event);
        }
    }
    None
}

/// The new project's dashboard is still being generated; follow it on the
/// aggregate status endpoint, ignoring other projects' dashboards.
fn follow_new_dashboard(ctx: &Context, project_id: String, name: String) {
    let mut poller = PollManager::with_interval(
        DashboardStatusSource::watched_only(ctx.api()),
        ctx.poll_interval,
    );
    let entity = WatchedEntity {
        id: project_id,
        name,
        status: ProjectStatus::InProgress,
    };
    if poller.start(&[entity]) {
        watch_until_done(&mut poller, |_| {});
    }
}

fn watch_dashboards(ctx: &Context) -> Result<(), LogDeckError> {
    let status = ctx.client.dashboard_creation_status()?;
    let entities: Vec<WatchedEntity> = status
        .projects_in_progress
        .iter()
        .map(WatchedEntity::from)
        .collect();
    let mut poller =
        PollManager::with_interval(DashboardStatusSource::new(ctx.api()), ctx.poll_interval);
    if !status.in_progress || !poller.start(&entities) {
        println!("No dashboards are being generated.");
        return Ok(());
    }
    watch_until_done(&mut poller, |_| {});
    Ok(())
}

/// Print poll progress until the poller stops. `on_snapshot` sees every
/// snapshot, including the final one.
fn watch_until_done<S: StatusSource>(
    poller: &mut PollManager<S>,
    mut on_snapshot: impl FnMut(&[WatchedEntity]),
) {
    let mut last_notice = usize::MAX;
    while poller.is_running() {
        let Some(msg) = poller.wait_progress(Duration::from_millis(500)) else {
            continue;
        };
        match msg {
            PollProgress::Started { count } => println!("Watching {count} item(s)..."),
            PollProgress::Snapshot { entities, changed } => {
                for e in entities.iter().filter(|e| changed.contains(&e.id)) {
                    println!("  {}  {}  {}", e.id, e.status, e.name);
                }
                on_snapshot(&entities);
                let in_flight = poller.in_flight();
                if poller.is_notification_visible() && in_flight != last_notice {
                    println!("  {in_flight} item(s) still processing");
                    last_notice = in_flight;
                }
            }
            PollProgress::EntityError { id, message } => {
                eprintln!("  {id}: status check failed ({message}); will retry");
            }
            PollProgress::Completed { entities } => {
                for e in &entities {
                    println!("  {}  {}  {}", e.id, e.status, e.name);
                }
                on_snapshot(&entities);
                println!("All done.");
            }
            PollProgress::Stopped => {}
        }
    }
    poller.shutdown();
}

// =============================================================================
// Output and prompts
// =============================================================================

fn print_project_page(store: &ProjectStore) {
    let state = store.state();
    if state.projects.is_empty() {
        println!("No projects.");
        return;
    }
    for project in &state.projects {
        println!("{:<24}  {:<12}  {}", project.id, project.status.as_str(), project.name);
    }
    println!(
        "Page {} of {} ({} projects){}{}",
        state.current_page,
        state.total_pages,
        state.total_items,
        if state.has_previous { "  [prev]" } else { "" },
        if state.has_next { "  [next]" } else { "" },
    );
}

fn print_project(project: &Project) {
    println!("{}  {}", project.id, project.name);
    println!("  status: {}", project.status);
    if let Some(description) = project.description.as_deref().filter(|d| !d.is_empty()) {
        println!("  description: {description}");
    }
    if let Some(dashboard) = &project.dashboard {
        match &dashboard.url {
            Some(url) => println!("  dashboard: {} ({url})", dashboard.title),
            None => println!("  dashboard: {} (not provisioned yet)", dashboard.title),
        }
    }
    if let Some(public) = &project.public_dashboard {
        println!("  public dashboard: {}", public.public_url);
    }
    if let Some(created) = project.created_at {
        println!("  created: {}", created.format("%Y-%m-%d %H:%M UTC"));
    }
}

fn prompt(label: &str) -> Result<String, LogDeckError> {
    print!("{label}: ");
    read_line()
}

fn password_or_prompt(password: Option<String>, label: &str) -> Result<String, LogDeckError> {
    match password {
        Some(p) => Ok(p),
        None => prompt(label),
    }
}

/// True on Enter; false on "q" or end of input.
fn confirm(message: &str) -> Result<bool, LogDeckError> {
    print!("{message}");
    let mut line = String::new();
    std::io::stdout().flush().map_err(|e| LogDeckError::Io {
        operation: "write prompt",
        source: e,
    })?;
    let read = std::io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| LogDeckError::Io {
            operation: "read confirmation",
            source: e,
        })?;
    Ok(read > 0 && !line.trim().eq_ignore_ascii_case("q"))
}

fn read_line() -> Result<String, LogDeckError> {
    std::io::stdout().flush().map_err(|e| LogDeckError::Io {
        operation: "write prompt",
        source: e,
    })?;
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| LogDeckError::Io {
            operation: "read input",
            source: e,
        })?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
