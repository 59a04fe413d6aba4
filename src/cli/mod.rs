use std::str::FromStr;
use std::time::Duration;

use clap::{Args, Subcommand};
use serde_json::{Value, json};
use tracing::error;
use uuid::Uuid;

use crate::{
    board::{BoardFilters, BoardStore},
    config,
    db::Database,
    error::Error,
    github::{GitHubClient, RemoteComment, RemoteTracker},
    service::{CreateIssue, IssueService},
    settings::Settings,
    sync::SyncDirection,
    types::{Group, IssueDetails, Notification, RepoConfig, Role, Tag, User},
};

const SCHEMA_VERSION: &str = "cli.v1";

#[derive(Debug, Clone, Subcommand)]
pub enum RootCommand {
    /// Pull issues and labels from the configured repository.
    Sync,
    Tags {
        #[command(subcommand)]
        command: TagCommand,
    },
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Check that the configured repository is reachable.
    Validate,
    /// Show the authenticated account and its organizations.
    Whoami,
    /// Render the kanban board.
    Board(BoardArgs),
    Issue {
        #[command(subcommand)]
        command: IssueCommand,
    },
    User {
        #[command(subcommand)]
        command: UserCommand,
    },
    Group {
        #[command(subcommand)]
        command: GroupCommand,
    },
    Inbox {
        #[command(subcommand)]
        command: InboxCommand,
    },
    /// Upload an image into the repository's image directory.
    Upload(UploadArgs),
}

#[derive(Debug, Clone, Subcommand)]
pub enum ConfigCommand {
    Show,
    Set(ConfigSetArgs),
    /// List repositories the token can see, to pick one for `config set`.
    Repos(ConfigReposArgs),
}

#[derive(Debug, Clone, Subcommand)]
pub enum TagCommand {
    /// Reconcile tags with GitHub labels.
    Sync(TagSyncArgs),
    List,
    Delete(TagDeleteArgs),
}

#[derive(Debug, Clone, Subcommand)]
pub enum IssueCommand {
    List(IssueListArgs),
    Show(IssueShowArgs),
    Create(IssueCreateArgs),
    Move(IssueMoveArgs),
    Delete(IssueDeleteArgs),
    /// List the GitHub comments on an issue.
    Comments(IssueShowArgs),
    /// Add a GitHub comment to an issue.
    Comment(IssueCommentArgs),
}

#[derive(Debug, Clone, Subcommand)]
pub enum UserCommand {
    List,
    Add(UserAddArgs),
}

#[derive(Debug, Clone, Subcommand)]
pub enum GroupCommand {
    List,
    Add(GroupAddArgs),
}

#[derive(Debug, Clone, Subcommand)]
pub enum InboxCommand {
    List,
    Read(InboxReadArgs),
}

#[derive(Debug, Clone, Args)]
pub struct TagSyncArgs {
    #[arg(long, value_name = "DIRECTION", default_value = "both")]
    pub direction: String,
}

#[derive(Debug, Clone, Args)]
pub struct TagDeleteArgs {
    #[arg(long, value_name = "NAME")]
    pub name: String,
}

#[derive(Debug, Clone, Args)]
pub struct ConfigSetArgs {
    #[arg(long, value_name = "OWNER")]
    pub owner: String,

    #[arg(long, value_name = "REPO")]
    pub repo: String,
}

#[derive(Debug, Clone, Args)]
pub struct ConfigReposArgs {
    /// Scope the listing to an organization instead of the user.
    #[arg(long, value_name = "NAME")]
    pub org: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct BoardArgs {
    #[command(flatten)]
    pub filters: FilterArgs,
}

#[derive(Debug, Clone, Args)]
pub struct FilterArgs {
    #[arg(long, value_name = "NAME")]
    pub tag: Vec<String>,

    #[arg(long, value_name = "NAME")]
    pub group: Vec<String>,

    #[arg(long, value_name = "USERNAME")]
    pub assignee: Vec<String>,

    /// open, closed, or all.
    #[arg(long, value_name = "STATE")]
    pub state: Option<String>,

    /// critical, high, medium, low, none, or all.
    #[arg(long, value_name = "PRIORITY")]
    pub priority: Option<String>,

    #[arg(long, value_name = "TEXT")]
    pub search: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct IssueListArgs {
    #[command(flatten)]
    pub filters: FilterArgs,

    /// Skip the remote refresh before listing.
    #[arg(long)]
    pub no_sync: bool,
}

#[derive(Debug, Clone, Args)]
pub struct IssueShowArgs {
    #[arg(long, value_name = "ISSUE")]
    pub id: String,
}

#[derive(Debug, Clone, Args)]
pub struct IssueCreateArgs {
    #[arg(long, value_name = "TEXT")]
    pub title: String,

    #[arg(long, value_name = "TEXT")]
    pub body: Option<String>,

    #[arg(long, value_name = "PRIORITY")]
    pub priority: Option<String>,

    #[arg(long, value_name = "NAME")]
    pub tag: Vec<String>,

    #[arg(long, value_name = "USERNAME")]
    pub assignee: Vec<String>,
}

#[derive(Debug, Clone, Args)]
pub struct IssueMoveArgs {
    #[arg(long, value_name = "ISSUE")]
    pub id: String,

    #[arg(long, value_name = "COLUMN")]
    pub column: String,

    #[arg(long, value_name = "N", default_value_t = 0)]
    pub position: i64,
}

#[derive(Debug, Clone, Args)]
pub struct IssueCommentArgs {
    #[arg(long, value_name = "ISSUE")]
    pub id: String,

    #[arg(long, value_name = "TEXT")]
    pub body: String,
}

#[derive(Debug, Clone, Args)]
pub struct IssueDeleteArgs {
    #[arg(long, value_name = "ISSUE")]
    pub id: String,
}

#[derive(Debug, Clone, Args)]
pub struct UserAddArgs {
    #[arg(long, value_name = "EMAIL")]
    pub email: String,

    #[arg(long, value_name = "USERNAME")]
    pub username: String,

    #[arg(long, value_name = "TEXT")]
    pub name: Option<String>,

    #[arg(long, value_name = "ROLE", default_value = "member")]
    pub role: String,
}

#[derive(Debug, Clone, Args)]
pub struct GroupAddArgs {
    #[arg(long, value_name = "NAME")]
    pub name: String,

    #[arg(long, value_name = "HEX")]
    pub color: String,

    #[arg(long, value_name = "TEXT")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct InboxReadArgs {
    #[arg(long, value_name = "NOTIFICATION_ID")]
    pub id: Uuid,
}

#[derive(Debug, Clone, Args)]
pub struct UploadArgs {
    #[arg(long, value_name = "PATH")]
    pub file: std::path::PathBuf,
}

pub fn run(command: RootCommand, acting_user: Option<&str>, json_output: bool, quiet: bool) -> i32 {
    match execute(command, acting_user) {
        Ok(output) => {
            print_success(output, json_output, quiet);
            0
        }
        Err(err) => {
            print_error(&err, json_output);
            err.exit_code
        }
    }
}

struct CommandOutput {
    command: &'static str,
    data: Value,
    text: String,
}

#[derive(Debug)]
struct CliError {
    exit_code: i32,
    code: &'static str,
    message: String,
    details: Option<Value>,
}

type CliResult<T> = Result<T, CliError>;

fn execute(command: RootCommand, acting_user: Option<&str>) -> CliResult<CommandOutput> {
    let settings = Settings::load();
    let db_path = settings.database_path().map_err(runtime_error)?;
    let db = Database::open(&db_path).map_err(runtime_error)?;

    let repo = config::resolve_repo(&db).map_err(runtime_error)?;
    let token = std::env::var("GITHUB_TOKEN").unwrap_or_default();
    let timeout = Duration::from_secs(settings.request_timeout_secs);
    let client =
        GitHubClient::new(repo.clone(), token, timeout).map_err(classify_service_error)?;
    let service = IssueService::new(&db, &client, repo.clone());

    let actor = resolve_actor(&db, acting_user)?;

    match command {
        RootCommand::Sync => sync_command(&service),
        RootCommand::Tags { command } => tag_command(&db, &service, actor.as_ref(), command),
        RootCommand::Config { command } => config_command(&db, &repo, &client, command),
        RootCommand::Validate => validate_command(&client),
        RootCommand::Whoami => whoami_command(&client),
        RootCommand::Board(args) => board_command(&db, &service, &settings, args),
        RootCommand::Issue { command } => {
            issue_command(&db, &service, &settings, actor.as_ref(), command)
        }
        RootCommand::User { command } => user_command(&db, command),
        RootCommand::Group { command } => group_command(&db, command),
        RootCommand::Inbox { command } => inbox_command(&db, actor.as_ref(), command),
        RootCommand::Upload(args) => upload_command(&service, args),
    }
}

fn resolve_actor(db: &Database, username: Option<&str>) -> CliResult<Option<User>> {
    let Some(username) = username else {
        return Ok(None);
    };
    db.find_user_by_username(username)
        .map_err(runtime_error)?
        .map(Some)
        .ok_or_else(|| not_found_error("USER_NOT_FOUND", format!("user '{username}' not found")))
}

fn sync_command(service: &IssueService<'_>) -> CliResult<CommandOutput> {
    let report = service.sync_issues().map_err(classify_service_error)?;
    let data = json!({ "report": report });
    let text = format!(
        "synced {} issues ({} created, {} updated, {} deleted)",
        report.fetched, report.created, report.updated, report.deleted
    );
    Ok(CommandOutput {
        command: "sync",
        data,
        text,
    })
}

fn tag_command(
    db: &Database,
    service: &IssueService<'_>,
    actor: Option<&User>,
    command: TagCommand,
) -> CliResult<CommandOutput> {
    match command {
        TagCommand::Sync(args) => {
            let direction = SyncDirection::from_str(&args.direction).map_err(|()| {
                usage_error(
                    "INVALID_DIRECTION",
                    format!(
                        "invalid direction '{}'; expected import, export, or both",
                        args.direction
                    ),
                )
            })?;

            let report = service
                .sync_tags(actor, direction)
                .map_err(classify_service_error)?;
            let text = if report.errors.is_empty() {
                format!(
                    "tag sync done ({} imported, {} exported)",
                    report.imported, report.exported
                )
            } else {
                format!(
                    "tag sync finished with {} errors ({} imported, {} exported)",
                    report.errors.len(),
                    report.imported,
                    report.exported
                )
            };
            Ok(CommandOutput {
                command: "tags sync",
                data: json!({ "report": report }),
                text,
            })
        }
        TagCommand::List => {
            let tags = db.list_tags().map_err(runtime_error)?;
            let data = json!({
                "tags": tags.iter().map(tag_json).collect::<Vec<_>>()
            });
            let text = render_tag_list_text(&tags);
            Ok(CommandOutput {
                command: "tags list",
                data,
                text,
            })
        }
        TagCommand::Delete(args) => {
            service
                .delete_tag(actor, &args.name)
                .map_err(classify_service_error)?;
            Ok(CommandOutput {
                command: "tags delete",
                data: json!({ "deleted": true, "name": args.name }),
                text: format!("deleted tag {}", args.name),
            })
        }
    }
}

fn render_tag_list_text(tags: &[Tag]) -> String {
    if tags.is_empty() {
        return "No tags found.".to_string();
    }

    let headers = ["Name", "Category", "Color"];
    let rows = tags
        .iter()
        .map(|tag| {
            vec![
                tag.name.clone(),
                tag.category.as_str().to_string(),
                tag.color.clone(),
            ]
        })
        .collect::<Vec<_>>();
    render_text_table(&headers, &rows)
}

fn config_command(
    db: &Database,
    current: &RepoConfig,
    client: &GitHubClient,
    command: ConfigCommand,
) -> CliResult<CommandOutput> {
    match command {
        ConfigCommand::Show => {
            let text = if current.is_configured() {
                format!("repository: {}/{}", current.owner, current.repo)
            } else {
                "no repository configured".to_string()
            };
            Ok(CommandOutput {
                command: "config show",
                data: json!({
                    "owner": current.owner,
                    "repo": current.repo,
                    "configured": current.is_configured()
                }),
                text,
            })
        }
        ConfigCommand::Set(args) => {
            let owner = args.owner.trim();
            let repo = args.repo.trim();
            if owner.is_empty() || repo.is_empty() {
                return Err(usage_error(
                    "CONFIG_INCOMPLETE",
                    "both --owner and --repo are required",
                ));
            }
            let updated = RepoConfig::new(owner, repo);
            config::save_repo(db, &updated).map_err(runtime_error)?;
            Ok(CommandOutput {
                command: "config set",
                data: json!({ "owner": updated.owner, "repo": updated.repo }),
                text: format!("repository set to {}/{}", updated.owner, updated.repo),
            })
        }
        ConfigCommand::Repos(args) => {
            let repos = client
                .list_repositories(args.org.as_deref())
                .map_err(classify_service_error)?;
            let data = json!({
                "repositories": repos
                    .iter()
                    .map(|repo| json!({
                        "full_name": repo.full_name,
                        "default_branch": repo.default_branch,
                        "open_issues": repo.open_issues_count
                    }))
                    .collect::<Vec<_>>()
            });
            let text = if repos.is_empty() {
                "No repositories found.".to_string()
            } else {
                let headers = ["Repository", "Default branch", "Open issues"];
                let rows = repos
                    .iter()
                    .map(|repo| {
                        vec![
                            repo.full_name.clone(),
                            repo.default_branch.clone(),
                            repo.open_issues_count.to_string(),
                        ]
                    })
                    .collect::<Vec<_>>();
                render_text_table(&headers, &rows)
            };
            Ok(CommandOutput {
                command: "config repos",
                data,
                text,
            })
        }
    }
}

fn whoami_command(client: &GitHubClient) -> CliResult<CommandOutput> {
    let account = client.current_user().map_err(classify_service_error)?;
    let orgs = client.list_orgs().map_err(classify_service_error)?;
    let logins = orgs.iter().map(|org| org.login.clone()).collect::<Vec<_>>();
    let text = if logins.is_empty() {
        format!("authenticated as {}", account.login)
    } else {
        format!("authenticated as {} (orgs: {})", account.login, logins.join(", "))
    };
    Ok(CommandOutput {
        command: "whoami",
        data: json!({ "login": account.login, "orgs": logins }),
        text,
    })
}

fn validate_command(client: &GitHubClient) -> CliResult<CommandOutput> {
    let repo = client.validate_connection().map_err(classify_service_error)?;
    Ok(CommandOutput {
        command: "validate",
        data: json!({
            "full_name": repo.full_name,
            "default_branch": repo.default_branch,
            "open_issues": repo.open_issues_count
        }),
        text: format!(
            "{} reachable (default branch {}, {} open issues)",
            repo.full_name, repo.default_branch, repo.open_issues_count
        ),
    })
}

fn board_command(
    db: &Database,
    service: &IssueService<'_>,
    settings: &Settings,
    args: BoardArgs,
) -> CliResult<CommandOutput> {
    let mut store = BoardStore::new();
    store
        .refresh(service, settings.sync_on_list)
        .map_err(classify_service_error)?;
    store.set_filters(resolve_filters(db, &args.filters)?);

    let columns = store.columns();
    let data = json!({
        "columns": columns
            .iter()
            .map(|(name, cards)| {
                json!({
                    "name": name,
                    "issues": cards.iter().map(|card| issue_json(card)).collect::<Vec<_>>()
                })
            })
            .collect::<Vec<_>>()
    });
    let text = render_board_text(&columns);

    Ok(CommandOutput {
        command: "board",
        data,
        text,
    })
}

fn render_board_text(columns: &[(&'static str, Vec<&IssueDetails>)]) -> String {
    let headers = ["Column", "#", "Title", "Priority", "Tags"];
    let rows = columns
        .iter()
        .flat_map(|(name, cards)| {
            cards.iter().map(|card| {
                vec![
                    name.to_string(),
                    format!("#{}", card.issue.github_number),
                    card.issue.title.replace('\n', " "),
                    card.issue.priority.as_str().to_string(),
                    card.tags
                        .iter()
                        .map(|tag| tag.name.clone())
                        .collect::<Vec<_>>()
                        .join(","),
                ]
            })
        })
        .collect::<Vec<_>>();

    if rows.is_empty() {
        return "The board is empty.".to_string();
    }
    render_text_table(&headers, &rows)
}

fn issue_command(
    db: &Database,
    service: &IssueService<'_>,
    settings: &Settings,
    actor: Option<&User>,
    command: IssueCommand,
) -> CliResult<CommandOutput> {
    match command {
        IssueCommand::List(args) => issue_list(db, service, settings, args),
        IssueCommand::Show(args) => issue_show(db, service, args),
        IssueCommand::Create(args) => issue_create(db, service, settings, actor, args),
        IssueCommand::Move(args) => issue_move(db, service, args),
        IssueCommand::Delete(args) => issue_delete(db, service, actor, args),
        IssueCommand::Comments(args) => issue_comments(db, service, args),
        IssueCommand::Comment(args) => issue_comment(db, service, actor, args),
    }
}

fn issue_list(
    db: &Database,
    service: &IssueService<'_>,
    settings: &Settings,
    args: IssueListArgs,
) -> CliResult<CommandOutput> {
    let refresh = settings.sync_on_list && !args.no_sync;
    let issues = service.list(refresh).map_err(classify_service_error)?;
    let filters = resolve_filters(db, &args.filters)?;
    let visible = crate::board::filter_issues(&issues, &filters);

    let data = json!({
        "issues": visible.iter().map(|card| issue_json(card)).collect::<Vec<_>>()
    });
    let text = render_issue_list_text(&visible);
    Ok(CommandOutput {
        command: "issue list",
        data,
        text,
    })
}

fn render_issue_list_text(issues: &[&IssueDetails]) -> String {
    if issues.is_empty() {
        return "No issues found.".to_string();
    }

    let headers = ["#", "State", "Column", "Priority", "Title", "Assignees"];
    let rows = issues
        .iter()
        .map(|card| {
            vec![
                format!("#{}", card.issue.github_number),
                card.issue.state.as_str().to_string(),
                card.issue.board_column.clone(),
                card.issue.priority.as_str().to_string(),
                card.issue.title.replace('\n', " "),
                card.assignees
                    .iter()
                    .map(|assignee| assignee.username.clone())
                    .collect::<Vec<_>>()
                    .join(","),
            ]
        })
        .collect::<Vec<_>>();
    render_text_table(&headers, &rows)
}

fn issue_show(
    db: &Database,
    service: &IssueService<'_>,
    args: IssueShowArgs,
) -> CliResult<CommandOutput> {
    let id = resolve_issue_selector(db, &args.id)?;
    let details = service.get(id).map_err(classify_service_error)?;
    let text = format!(
        "#{} {} [{} / {}]",
        details.issue.github_number,
        details.issue.title,
        details.issue.board_column,
        details.issue.state.as_str()
    );
    Ok(CommandOutput {
        command: "issue show",
        data: json!({ "issue": issue_json(&details) }),
        text,
    })
}

fn issue_create(
    db: &Database,
    service: &IssueService<'_>,
    settings: &Settings,
    actor: Option<&User>,
    args: IssueCreateArgs,
) -> CliResult<CommandOutput> {
    let priority = match args.priority.as_deref() {
        Some(raw) => crate::types::Priority::from_str(raw).map_err(|()| {
            usage_error("INVALID_PRIORITY", format!("invalid priority '{raw}'"))
        })?,
        None => settings.default_priority(),
    };

    let mut tag_ids = Vec::new();
    for name in &args.tag {
        let tag = db
            .find_tag_by_name(name)
            .map_err(runtime_error)?
            .ok_or_else(|| not_found_error("TAG_NOT_FOUND", format!("tag '{name}' not found")))?;
        tag_ids.push(tag.id);
    }

    let mut assignee_ids = Vec::new();
    for username in &args.assignee {
        let user = db
            .find_user_by_username(username)
            .map_err(runtime_error)?
            .ok_or_else(|| {
                not_found_error("USER_NOT_FOUND", format!("user '{username}' not found"))
            })?;
        assignee_ids.push(user.id);
    }

    let details = service
        .create(
            actor,
            &CreateIssue {
                title: args.title,
                body: args.body,
                priority: Some(priority),
                tag_ids,
                assignee_ids,
                ..CreateIssue::default()
            },
        )
        .map_err(classify_service_error)?;

    Ok(CommandOutput {
        command: "issue create",
        data: json!({ "issue": issue_json(&details) }),
        text: format!(
            "created issue #{} {}",
            details.issue.github_number, details.issue.title
        ),
    })
}

fn issue_move(
    db: &Database,
    service: &IssueService<'_>,
    args: IssueMoveArgs,
) -> CliResult<CommandOutput> {
    let id = resolve_issue_selector(db, &args.id)?;
    let column = args.column.trim().to_ascii_lowercase();
    if !crate::board::BOARD_COLUMNS.contains(&column.as_str()) {
        return Err(usage_error(
            "INVALID_COLUMN",
            format!(
                "invalid column '{}'; expected one of {}",
                args.column,
                crate::board::BOARD_COLUMNS.join(", ")
            ),
        ));
    }

    let mut store = BoardStore::new();
    store.refresh(service, false).map_err(classify_service_error)?;
    store
        .move_issue(service, id, &column, args.position)
        .map_err(classify_service_error)?;

    let details = service.get(id).map_err(classify_service_error)?;
    Ok(CommandOutput {
        command: "issue move",
        data: json!({ "issue": issue_json(&details) }),
        text: format!(
            "moved #{} to {} (position {})",
            details.issue.github_number, details.issue.board_column, details.issue.board_position
        ),
    })
}

fn issue_delete(
    db: &Database,
    service: &IssueService<'_>,
    actor: Option<&User>,
    args: IssueDeleteArgs,
) -> CliResult<CommandOutput> {
    let id = resolve_issue_selector(db, &args.id)?;
    let details = service.get(id).map_err(classify_service_error)?;
    service.delete(actor, id).map_err(classify_service_error)?;

    Ok(CommandOutput {
        command: "issue delete",
        data: json!({ "deleted": true, "issue_id": id }),
        text: format!(
            "closed #{} remotely and deleted it locally",
            details.issue.github_number
        ),
    })
}

fn issue_comments(
    db: &Database,
    service: &IssueService<'_>,
    args: IssueShowArgs,
) -> CliResult<CommandOutput> {
    let id = resolve_issue_selector(db, &args.id)?;
    let comments = service.comments(id).map_err(classify_service_error)?;

    let data = json!({
        "comments": comments.iter().map(comment_json).collect::<Vec<_>>()
    });
    let text = if comments.is_empty() {
        "No comments.".to_string()
    } else {
        comments
            .iter()
            .map(|comment| {
                format!(
                    "[{}] {}: {}",
                    comment.created_at,
                    comment
                        .user
                        .as_ref()
                        .map(|user| user.login.as_str())
                        .unwrap_or("unknown"),
                    comment.body.as_deref().unwrap_or("").replace('\n', " ")
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };
    Ok(CommandOutput {
        command: "issue comments",
        data,
        text,
    })
}

fn issue_comment(
    db: &Database,
    service: &IssueService<'_>,
    actor: Option<&User>,
    args: IssueCommentArgs,
) -> CliResult<CommandOutput> {
    let id = resolve_issue_selector(db, &args.id)?;
    let comment = service
        .add_comment(actor, id, &args.body)
        .map_err(classify_service_error)?;
    Ok(CommandOutput {
        command: "issue comment",
        data: json!({ "comment": comment_json(&comment) }),
        text: format!("added comment {}", comment.id),
    })
}

fn user_command(db: &Database, command: UserCommand) -> CliResult<CommandOutput> {
    match command {
        UserCommand::List => {
            let users = db.list_users().map_err(runtime_error)?;
            let data = json!({
                "users": users.iter().map(user_json).collect::<Vec<_>>()
            });
            let text = render_user_list_text(&users);
            Ok(CommandOutput {
                command: "user list",
                data,
                text,
            })
        }
        UserCommand::Add(args) => {
            let role = Role::from_str(&args.role)
                .map_err(|()| usage_error("INVALID_ROLE", format!("invalid role '{}'", args.role)))?;
            // Accounts created from the CLI have no password until the web
            // surface sets one.
            let user = db
                .add_user(&args.email, &args.username, "", args.name, role)
                .map_err(runtime_error)?;
            Ok(CommandOutput {
                command: "user add",
                data: json!({ "user": user_json(&user) }),
                text: format!("created user {} ({})", user.username, user.id),
            })
        }
    }
}

fn render_user_list_text(users: &[User]) -> String {
    if users.is_empty() {
        return "No users found.".to_string();
    }

    let headers = ["ID", "Username", "Name", "Role"];
    let rows = users
        .iter()
        .map(|user| {
            let id = user.id.to_string();
            vec![
                id.chars().take(8).collect::<String>(),
                user.username.clone(),
                user.name.clone().unwrap_or_else(|| "-".to_string()),
                user.role.as_str().to_string(),
            ]
        })
        .collect::<Vec<_>>();
    render_text_table(&headers, &rows)
}

fn group_command(db: &Database, command: GroupCommand) -> CliResult<CommandOutput> {
    match command {
        GroupCommand::List => {
            let groups = db.list_groups().map_err(runtime_error)?;
            let data = json!({
                "groups": groups.iter().map(group_json).collect::<Vec<_>>()
            });
            let text = if groups.is_empty() {
                "No groups found.".to_string()
            } else {
                let headers = ["ID", "Name", "Color"];
                let rows = groups
                    .iter()
                    .map(|group| {
                        let id = group.id.to_string();
                        vec![
                            id.chars().take(8).collect::<String>(),
                            group.name.clone(),
                            group.color.clone(),
                        ]
                    })
                    .collect::<Vec<_>>();
                render_text_table(&headers, &rows)
            };
            Ok(CommandOutput {
                command: "group list",
                data,
                text,
            })
        }
        GroupCommand::Add(args) => {
            let group = db
                .add_group(&args.name, &args.color, args.description)
                .map_err(runtime_error)?;
            Ok(CommandOutput {
                command: "group add",
                data: json!({ "group": group_json(&group) }),
                text: format!("created group {} ({})", group.name, group.id),
            })
        }
    }
}

fn inbox_command(
    db: &Database,
    actor: Option<&User>,
    command: InboxCommand,
) -> CliResult<CommandOutput> {
    match command {
        InboxCommand::List => {
            let actor = actor.ok_or_else(|| {
                usage_error("USER_REQUIRED", "provide --user to read an inbox")
            })?;
            let notifications = db.list_notifications(actor.id).map_err(runtime_error)?;
            let data = json!({
                "notifications": notifications
                    .iter()
                    .map(notification_json)
                    .collect::<Vec<_>>()
            });
            let text = render_inbox_text(&notifications);
            Ok(CommandOutput {
                command: "inbox list",
                data,
                text,
            })
        }
        InboxCommand::Read(args) => {
            db.mark_notification_read(args.id).map_err(runtime_error)?;
            Ok(CommandOutput {
                command: "inbox read",
                data: json!({ "read": true, "notification_id": args.id }),
                text: format!("marked {} as read", args.id),
            })
        }
    }
}

fn render_inbox_text(notifications: &[Notification]) -> String {
    if notifications.is_empty() {
        return "Inbox is empty.".to_string();
    }

    let headers = ["ID", "Kind", "Title", "Read"];
    let rows = notifications
        .iter()
        .map(|notification| {
            let id = notification.id.to_string();
            vec![
                id.chars().take(8).collect::<String>(),
                notification.kind.as_str().to_string(),
                notification.title.replace('\n', " "),
                if notification.read { "yes" } else { "no" }.to_string(),
            ]
        })
        .collect::<Vec<_>>();
    render_text_table(&headers, &rows)
}

fn upload_command(service: &IssueService<'_>, args: UploadArgs) -> CliResult<CommandOutput> {
    let filename = args
        .file
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| usage_error("INVALID_FILE", "file path has no usable file name"))?
        .to_string();
    let content = std::fs::read(&args.file).map_err(|err| {
        not_found_error(
            "FILE_NOT_READABLE",
            format!("cannot read '{}': {err}", args.file.display()),
        )
    })?;

    let short_url = service
        .upload_image(&filename, &content)
        .map_err(classify_service_error)?;
    Ok(CommandOutput {
        command: "upload",
        data: json!({ "url": short_url }),
        text: format!("uploaded {filename} -> {short_url}"),
    })
}

fn resolve_filters(db: &Database, args: &FilterArgs) -> CliResult<BoardFilters> {
    let mut filters = BoardFilters {
        text: args.search.clone(),
        ..BoardFilters::default()
    };

    if let Some(raw) = args.state.as_deref()
        && !is_all_filter(raw)
    {
        let state = crate::types::IssueState::from_str(raw).map_err(|()| {
            usage_error(
                "INVALID_STATE",
                format!("invalid state '{raw}'; expected open, closed, or all"),
            )
        })?;
        filters.state = Some(state);
    }
    if let Some(raw) = args.priority.as_deref()
        && !is_all_filter(raw)
    {
        let priority = crate::types::Priority::from_str(raw).map_err(|()| {
            usage_error(
                "INVALID_PRIORITY",
                format!("invalid priority '{raw}'; expected critical, high, medium, low, none, or all"),
            )
        })?;
        filters.priority = Some(priority);
    }

    for name in &args.tag {
        let tag = db
            .find_tag_by_name(name)
            .map_err(runtime_error)?
            .ok_or_else(|| not_found_error("TAG_NOT_FOUND", format!("tag '{name}' not found")))?;
        filters.tag_ids.push(tag.id);
    }
    for name in &args.group {
        let group = db
            .find_group_by_name(name)
            .map_err(runtime_error)?
            .ok_or_else(|| {
                not_found_error("GROUP_NOT_FOUND", format!("group '{name}' not found"))
            })?;
        filters.group_ids.push(group.id);
    }
    for username in &args.assignee {
        let user = db
            .find_user_by_username(username)
            .map_err(runtime_error)?
            .ok_or_else(|| {
                not_found_error("USER_NOT_FOUND", format!("user '{username}' not found"))
            })?;
        filters.assignee_ids.push(user.id);
    }

    Ok(filters)
}

fn is_all_filter(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all")
}

/// Accepts `#12` or `12` as an issue number, a full UUID, or a UUID prefix.
fn resolve_issue_selector(db: &Database, selector: &str) -> CliResult<Uuid> {
    let trimmed = selector.trim();
    if trimmed.is_empty() {
        return Err(usage_error("ISSUE_REQUIRED", "issue id cannot be empty"));
    }

    let number_part = trimmed.strip_prefix('#').unwrap_or(trimmed);
    if let Ok(number) = number_part.parse::<i64>() {
        return db
            .find_issue_by_number(number)
            .map_err(runtime_error)?
            .map(|issue| issue.id)
            .ok_or_else(|| {
                not_found_error("ISSUE_NOT_FOUND", format!("issue #{number} not found"))
            });
    }

    if let Ok(parsed) = Uuid::parse_str(trimmed) {
        return Ok(parsed);
    }

    let needle = trimmed.to_ascii_lowercase();
    let issues = db.list_issues().map_err(runtime_error)?;
    let matches: Vec<Uuid> = issues
        .iter()
        .filter(|issue| issue.id.to_string().to_ascii_lowercase().starts_with(&needle))
        .map(|issue| issue.id)
        .collect();

    match matches.as_slice() {
        [single] => Ok(*single),
        [] => Err(not_found_error(
            "ISSUE_NOT_FOUND",
            format!("issue '{selector}' not found"),
        )),
        many => Err(conflict_error(
            "ISSUE_ID_AMBIGUOUS",
            format!(
                "issue id prefix '{selector}' matches {} issues; use a longer id",
                many.len()
            ),
            Some(json!({
                "matches": many.iter().map(|id| id.to_string()).collect::<Vec<_>>()
            })),
        )),
    }
}

fn render_text_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths = headers
        .iter()
        .map(|header| header.chars().count())
        .collect::<Vec<_>>();

    for row in rows {
        for (index, cell) in row.iter().enumerate() {
            let width = cell.chars().count();
            if width > widths[index] {
                widths[index] = width;
            }
        }
    }

    let border = format!(
        "+{}+",
        widths
            .iter()
            .map(|width| "-".repeat(*width + 2))
            .collect::<Vec<_>>()
            .join("+")
    );

    let mut lines = Vec::new();
    lines.push(border.clone());
    lines.push(format!(
        "| {} |",
        headers
            .iter()
            .enumerate()
            .map(|(index, header)| format!("{header:<width$}", width = widths[index]))
            .collect::<Vec<_>>()
            .join(" | ")
    ));
    lines.push(border.clone());

    for row in rows {
        lines.push(format!(
            "| {} |",
            row.iter()
                .enumerate()
                .map(|(index, cell)| format!("{cell:<width$}", width = widths[index]))
                .collect::<Vec<_>>()
                .join(" | ")
        ));
    }

    lines.push(border);
    lines.join("\n")
}

fn issue_json(details: &IssueDetails) -> Value {
    json!({
        "id": details.issue.id,
        "github_number": details.issue.github_number,
        "title": details.issue.title,
        "body": details.issue.body,
        "state": details.issue.state.as_str(),
        "priority": details.issue.priority.as_str(),
        "board_column": details.issue.board_column,
        "board_position": details.issue.board_position,
        "remote_url": details.issue.remote_url,
        "due_date": details.issue.due_date,
        "estimated_hours": details.issue.estimated_hours,
        "synced_at": details.issue.synced_at,
        "tags": details.tags.iter().map(tag_json).collect::<Vec<_>>(),
        "groups": details.groups.iter().map(group_json).collect::<Vec<_>>(),
        "assignees": details
            .assignees
            .iter()
            .map(|assignee| json!({
                "id": assignee.id,
                "username": assignee.username,
                "name": assignee.name
            }))
            .collect::<Vec<_>>(),
        "created_at": details.issue.created_at,
        "updated_at": details.issue.updated_at
    })
}

fn tag_json(tag: &Tag) -> Value {
    json!({
        "id": tag.id,
        "name": tag.name,
        "color": tag.color,
        "description": tag.description,
        "category": tag.category.as_str(),
        "created_at": tag.created_at
    })
}

fn group_json(group: &Group) -> Value {
    json!({
        "id": group.id,
        "name": group.name,
        "color": group.color,
        "description": group.description,
        "created_at": group.created_at
    })
}

fn user_json(user: &User) -> Value {
    json!({
        "id": user.id,
        "email": user.email,
        "username": user.username,
        "name": user.name,
        "role": user.role.as_str(),
        "created_at": user.created_at
    })
}

fn comment_json(comment: &RemoteComment) -> Value {
    json!({
        "id": comment.id,
        "body": comment.body,
        "author": comment.user.as_ref().map(|user| user.login.clone()),
        "created_at": comment.created_at
    })
}

fn notification_json(notification: &Notification) -> Value {
    json!({
        "id": notification.id,
        "kind": notification.kind.as_str(),
        "title": notification.title,
        "message": notification.message,
        "issue_id": notification.issue_id,
        "read": notification.read,
        "created_at": notification.created_at
    })
}

fn usage_error(code: &'static str, message: impl Into<String>) -> CliError {
    CliError {
        exit_code: 2,
        code,
        message: message.into(),
        details: None,
    }
}

fn not_found_error(code: &'static str, message: impl Into<String>) -> CliError {
    CliError {
        exit_code: 3,
        code,
        message: message.into(),
        details: None,
    }
}

fn conflict_error(
    code: &'static str,
    message: impl Into<String>,
    details: Option<Value>,
) -> CliError {
    CliError {
        exit_code: 4,
        code,
        message: message.into(),
        details,
    }
}

fn runtime_error(err: impl std::fmt::Display) -> CliError {
    CliError {
        exit_code: 5,
        code: "RUNTIME_ERROR",
        message: err.to_string(),
        details: None,
    }
}

fn classify_service_error(err: Error) -> CliError {
    let message = err.to_string();
    match &err {
        Error::Validation(_) => CliError {
            exit_code: 2,
            code: "VALIDATION",
            message,
            details: None,
        },
        Error::NotFound(_) => CliError {
            exit_code: 3,
            code: "NOT_FOUND",
            message,
            details: None,
        },
        Error::Unauthorized | Error::Forbidden(_) => CliError {
            exit_code: 4,
            code: err.code(),
            message,
            details: None,
        },
        Error::RemoteUnavailable(_) | Error::Upload(_) => CliError {
            exit_code: 6,
            code: err.code(),
            message,
            details: None,
        },
        Error::Store(_) => runtime_error(message),
    }
}

fn print_success(output: CommandOutput, json_output: bool, quiet: bool) {
    if json_output {
        let payload = json!({
            "schema_version": SCHEMA_VERSION,
            "command": output.command,
            "data": output.data
        });
        match serde_json::to_string_pretty(&payload) {
            Ok(value) => println!("{value}"),
            Err(_) => println!("{}", payload),
        }
        return;
    }

    if quiet {
        return;
    }

    if output.text.is_empty() {
        println!("ok");
    } else {
        println!("{}", output.text);
    }
}

fn print_error(err: &CliError, json_output: bool) {
    error!(
        code = err.code,
        message = %err.message,
        details = ?err.details,
        "cli command failed"
    );

    if json_output {
        let payload = json!({
            "schema_version": SCHEMA_VERSION,
            "error": {
                "code": err.code,
                "message": err.message,
                "details": err.details
            }
        });
        match serde_json::to_string_pretty(&payload) {
            Ok(value) => eprintln!("{value}"),
            Err(_) => eprintln!("{}", payload),
        }
        return;
    }

    eprintln!("error[{}]: {}", err.code, err.message);
}

#[cfg(test)]
mod tests {
    use crate::types::IssueState;

    use super::*;

    fn open_db() -> Database {
        Database::open(":memory:").expect("db should open")
    }

    #[test]
    fn resolve_issue_selector_accepts_number_forms() {
        let db = open_db();
        let issue = db
            .upsert_remote_issue(42, "Answer", None, IssueState::Open, "https://x/42")
            .expect("issue should save");

        assert_eq!(resolve_issue_selector(&db, "42").expect("number"), issue.id);
        assert_eq!(resolve_issue_selector(&db, "#42").expect("hash"), issue.id);
    }

    #[test]
    fn resolve_issue_selector_accepts_uuid_prefix() {
        let db = open_db();
        let issue = db
            .upsert_remote_issue(1, "One", None, IssueState::Open, "https://x/1")
            .expect("issue should save");
        let short = issue.id.to_string().chars().take(8).collect::<String>();

        let resolved = resolve_issue_selector(&db, &short).expect("short id should resolve");
        assert_eq!(resolved, issue.id);
    }

    #[test]
    fn resolve_issue_selector_reports_missing_issue() {
        let db = open_db();
        let err = resolve_issue_selector(&db, "#7").expect_err("missing issue should fail");
        assert_eq!(err.exit_code, 3);
        assert_eq!(err.code, "ISSUE_NOT_FOUND");
    }

    #[test]
    fn classify_service_error_maps_exit_codes() {
        assert_eq!(
            classify_service_error(Error::Validation("title".into())).exit_code,
            2
        );
        assert_eq!(
            classify_service_error(Error::NotFound("issue".into())).exit_code,
            3
        );
        assert_eq!(classify_service_error(Error::Unauthorized).exit_code, 4);
        assert_eq!(
            classify_service_error(Error::RemoteUnavailable("down".into())).exit_code,
            6
        );
        assert_eq!(
            classify_service_error(Error::Store(anyhow::anyhow!("broken"))).exit_code,
            5
        );
    }

    #[test]
    fn resolve_filters_maps_names_to_ids() {
        let db = open_db();
        let tag = db
            .add_tag("bug", "#f00", None, crate::types::TagCategory::Github)
            .expect("tag should save");
        let user = db
            .add_user("a@example.com", "alice", "hash", None, Role::Member)
            .expect("user should save");

        let filters = resolve_filters(
            &db,
            &FilterArgs {
                tag: vec!["bug".to_string()],
                group: Vec::new(),
                assignee: vec!["alice".to_string()],
                state: Some("closed".to_string()),
                priority: Some("high".to_string()),
                search: Some("login".to_string()),
            },
        )
        .expect("filters should resolve");

        assert_eq!(filters.tag_ids, vec![tag.id]);
        assert_eq!(filters.assignee_ids, vec![user.id]);
        assert_eq!(filters.state, Some(IssueState::Closed));
        assert_eq!(filters.priority, Some(crate::types::Priority::High));
        assert_eq!(filters.text.as_deref(), Some("login"));
    }

    #[test]
    fn resolve_filters_treats_all_as_no_filter() {
        let db = open_db();
        let filters = resolve_filters(
            &db,
            &FilterArgs {
                tag: Vec::new(),
                group: Vec::new(),
                assignee: Vec::new(),
                state: Some("All".to_string()),
                priority: Some("".to_string()),
                search: None,
            },
        )
        .expect("all should resolve to no filter");
        assert_eq!(filters.state, None);
        assert_eq!(filters.priority, None);
        assert!(filters.is_empty());
    }

    #[test]
    fn resolve_filters_rejects_unknown_state() {
        let db = open_db();
        let err = resolve_filters(
            &db,
            &FilterArgs {
                tag: Vec::new(),
                group: Vec::new(),
                assignee: Vec::new(),
                state: Some("archived".to_string()),
                priority: None,
                search: None,
            },
        )
        .expect_err("unknown state should fail");
        assert_eq!(err.exit_code, 2);
        assert_eq!(err.code, "INVALID_STATE");
    }

    #[test]
    fn resolve_filters_rejects_unknown_tag() {
        let db = open_db();
        let err = resolve_filters(
            &db,
            &FilterArgs {
                tag: vec!["ghost".to_string()],
                group: Vec::new(),
                assignee: Vec::new(),
                state: None,
                priority: None,
                search: None,
            },
        )
        .expect_err("unknown tag should fail");
        assert_eq!(err.code, "TAG_NOT_FOUND");
    }

    #[test]
    fn render_text_table_pads_columns() {
        let output = render_text_table(
            &["#", "Title"],
            &[
                vec!["#1".to_string(), "Fix login".to_string()],
                vec!["#12".to_string(), "Docs".to_string()],
            ],
        );
        assert!(output.contains("| #1  | Fix login |"));
        assert!(output.contains("| #12 | Docs      |"));
    }
}
