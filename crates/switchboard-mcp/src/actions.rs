//! Tool and action enumerations
//!
//! Each tool has a closed action enum. Parsing turns `(tool, arguments)` into
//! an [`Invocation`], a sum type whose variants carry typed payloads; the
//! dispatcher matches on it exhaustively, so an action without a handler
//! does not compile.

use std::fmt;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use switchboard_core::records::{
    ClientEdit, LogsRequest, ProfileEdit, ServerSpec, ServerTransport, ShareOptions,
};
use switchboard_core::{GateError, Result};

use crate::args::Args;
use crate::config_io::ConfigImport;

macro_rules! closed_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            pub fn parse(value: &str) -> Option<Self> {
                Self::ALL.iter().copied().find(|v| v.as_str() == value)
            }

            pub fn names() -> Vec<&'static str> {
                Self::ALL.iter().map(|v| v.as_str()).collect()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

closed_enum!(ToolName {
    Server => "server",
    Profile => "profile",
    Client => "client",
    Config => "config",
    Project => "project",
    System => "system",
    Share => "share",
    Status => "status",
});

closed_enum!(ServerAction {
    List => "list",
    Info => "info",
    Install => "install",
    Uninstall => "uninstall",
    Search => "search",
    Create => "create",
    Edit => "edit",
});

closed_enum!(ProfileAction {
    List => "list",
    Create => "create",
    Edit => "edit",
    Delete => "delete",
    Suggest => "suggest",
    Restart => "restart",
});

closed_enum!(ClientAction {
    List => "list",
    Edit => "edit",
});

closed_enum!(ConfigAction {
    Get => "get",
    Set => "set",
    List => "list",
    Migrate => "migrate",
    Export => "export",
    Import => "import",
});

closed_enum!(ProjectAction {
    Analyze => "analyze",
    Diff => "diff",
    Devops => "devops",
    Test => "test",
});

closed_enum!(SystemAction {
    Bootstrap => "bootstrap",
    Restart => "restart",
    RestartInfra => "restart_infra",
    Rebuild => "rebuild",
    Stop => "stop",
    Start => "start",
    DockerLogs => "docker_logs",
    DockerStatus => "docker_status",
    Build => "build",
});

closed_enum!(ShareAction {
    Start => "start",
    Stop => "stop",
    List => "list",
});

impl ToolName {
    /// Valid actions, in declaration order; `status` takes none
    pub fn actions(&self) -> Vec<&'static str> {
        match self {
            ToolName::Server => ServerAction::names(),
            ToolName::Profile => ProfileAction::names(),
            ToolName::Client => ClientAction::names(),
            ToolName::Config => ConfigAction::names(),
            ToolName::Project => ProjectAction::names(),
            ToolName::System => SystemAction::names(),
            ToolName::Share => ShareAction::names(),
            ToolName::Status => Vec::new(),
        }
    }
}

// ============================================================================
// Typed calls
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum ServerCall {
    List,
    Info { name: String },
    Install { name: String },
    Uninstall { name: String },
    Search { query: Option<String> },
    Create(ServerSpec),
    Edit(ServerSpec),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProfileCall {
    List,
    Create { name: String, servers: Vec<String> },
    Edit { name: String, edit: ProfileEdit },
    Delete { name: String },
    Suggest { path: PathBuf, testing: bool },
    Restart { profile: Option<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientCall {
    List,
    Edit { name: String, edit: ClientEdit },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigCall {
    Get { key: String },
    Set { key: String, value: Value },
    List,
    Migrate,
    Export { redact: bool },
    Import(ConfigImport),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevopsRequest {
    pub path: PathBuf,
    pub project_type: Option<String>,
    pub force: bool,
    pub enable_ai_review: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectCall {
    Analyze { path: PathBuf },
    Diff { path: PathBuf, staged: bool },
    Devops(DevopsRequest),
    Test { path: PathBuf, languages: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemCall {
    Bootstrap,
    Restart { services: Vec<String> },
    RestartInfra,
    Rebuild { services: Vec<String>, no_cache: bool },
    Stop { services: Vec<String> },
    Start { services: Vec<String> },
    DockerLogs(LogsRequest),
    DockerStatus,
    Build { services: Vec<String>, no_cache: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareCall {
    Start { name: String, options: ShareOptions },
    Stop { name: String },
    List,
}

/// A fully validated tool call
#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    Server(ServerCall),
    Profile(ProfileCall),
    Client(ClientCall),
    Config(ConfigCall),
    Project(ProjectCall),
    System(SystemCall),
    Share(ShareCall),
    Status,
}

fn at_least_one(fields: &[&str]) -> GateError {
    GateError::validation(format!(
        "at least one of these arguments is required: {}",
        fields.join(", ")
    ))
}

/// Parse the action name for `tool`, listing every valid action on failure
fn action_of<A: Copy>(
    tool: ToolName,
    args: &Args,
    parse: fn(&str) -> Option<A>,
) -> Result<A> {
    let valid = tool.actions().join(", ");
    let action = args.opt_string("action")?.ok_or_else(|| {
        GateError::validation(format!(
            "Missing required argument 'action' for tool '{}'. Valid actions: {}",
            tool, valid
        ))
    })?;
    parse(&action).ok_or_else(|| {
        GateError::validation(format!(
            "Invalid action '{}' for tool '{}'. Valid actions: {}",
            action, tool, valid
        ))
    })
}

fn server_spec(args: &Args, name: String, creating: bool) -> Result<ServerSpec> {
    let transport = match args.opt_string("type")? {
        Some(t) => Some(ServerTransport::parse(&t)?),
        None if creating => {
            return Err(GateError::validation(
                "Missing required argument: type (one of stdio, streamable-http)",
            ))
        }
        None => None,
    };
    let spec = ServerSpec {
        name,
        transport,
        command: args.opt_string("command")?,
        args: args.list("args")?,
        url: args.opt_string("url")?,
        env: args.env_map("env")?,
        description: args.opt_string("description")?,
    };
    if creating {
        match spec.transport {
            Some(ServerTransport::Stdio) if spec.command.is_none() => {
                return Err(GateError::validation("stdio servers require 'command'"));
            }
            Some(ServerTransport::StreamableHttp) if spec.url.is_none() => {
                return Err(GateError::validation("streamable-http servers require 'url'"));
            }
            _ => {}
        }
    }
    Ok(spec)
}

impl ServerCall {
    fn parse(action: ServerAction, args: &Args) -> Result<Self> {
        Ok(match action {
            ServerAction::List => ServerCall::List,
            ServerAction::Info => ServerCall::Info { name: args.name("name", "server")? },
            ServerAction::Install => ServerCall::Install { name: args.name("name", "server")? },
            ServerAction::Uninstall => ServerCall::Uninstall { name: args.name("name", "server")? },
            ServerAction::Search => ServerCall::Search { query: args.opt_string("query")? },
            ServerAction::Create => {
                ServerCall::Create(server_spec(args, args.name("name", "server")?, true)?)
            }
            ServerAction::Edit => {
                let spec = server_spec(args, args.name("name", "server")?, false)?;
                if spec.is_empty_edit() {
                    return Err(at_least_one(&[
                        "type",
                        "command",
                        "args",
                        "url",
                        "env",
                        "description",
                    ]));
                }
                ServerCall::Edit(spec)
            }
        })
    }
}

impl ProfileCall {
    fn parse(action: ProfileAction, args: &Args, root: &Path) -> Result<Self> {
        Ok(match action {
            ProfileAction::List => ProfileCall::List,
            ProfileAction::Create => ProfileCall::Create {
                name: args.name("name", "profile")?,
                servers: args.name_list("servers", "server")?,
            },
            ProfileAction::Edit => {
                let name = args.name("name", "profile")?;
                let edit = ProfileEdit {
                    new_name: args.opt_name("new_name", "profile")?,
                    add_servers: args.name_list("add_servers", "server")?,
                    remove_servers: args.name_list("remove_servers", "server")?,
                };
                if edit.is_empty() {
                    return Err(at_least_one(&["new_name", "add_servers", "remove_servers"]));
                }
                ProfileCall::Edit { name, edit }
            }
            ProfileAction::Delete => ProfileCall::Delete { name: args.name("name", "profile")? },
            ProfileAction::Suggest => ProfileCall::Suggest {
                path: args.path("path", root)?,
                testing: args.flag("testing")?,
            },
            ProfileAction::Restart => ProfileCall::Restart {
                profile: args.opt_name("profile", "profile")?,
            },
        })
    }
}

impl ClientCall {
    fn parse(action: ClientAction, args: &Args) -> Result<Self> {
        Ok(match action {
            ClientAction::List => ClientCall::List,
            ClientAction::Edit => {
                let name = args.name("name", "client")?;
                let edit = ClientEdit {
                    add_servers: args.name_list("add_servers", "server")?,
                    remove_servers: args.name_list("remove_servers", "server")?,
                    add_profiles: args.name_list("add_profiles", "profile")?,
                    remove_profiles: args.name_list("remove_profiles", "profile")?,
                };
                if edit.is_empty() {
                    return Err(at_least_one(&[
                        "add_servers",
                        "remove_servers",
                        "add_profiles",
                        "remove_profiles",
                    ]));
                }
                ClientCall::Edit { name, edit }
            }
        })
    }
}

impl ConfigCall {
    fn parse(action: ConfigAction, args: &Args) -> Result<Self> {
        Ok(match action {
            ConfigAction::Get => ConfigCall::Get { key: args.string("key")? },
            ConfigAction::Set => ConfigCall::Set {
                key: args.string("key")?,
                value: args.value("value")?,
            },
            ConfigAction::List => ConfigCall::List,
            ConfigAction::Migrate => ConfigCall::Migrate,
            ConfigAction::Export => ConfigCall::Export {
                redact: args.opt_bool("redact")?.unwrap_or(true),
            },
            ConfigAction::Import => {
                ConfigCall::Import(ConfigImport::parse(args.value("payload")?)?)
            }
        })
    }
}

impl ProjectCall {
    fn parse(action: ProjectAction, args: &Args, root: &Path) -> Result<Self> {
        let path = args.path("path", root)?;
        Ok(match action {
            ProjectAction::Analyze => ProjectCall::Analyze { path },
            ProjectAction::Diff => ProjectCall::Diff {
                path,
                staged: args.flag("staged")?,
            },
            ProjectAction::Devops => ProjectCall::Devops(DevopsRequest {
                path,
                project_type: args.opt_string("project_type")?.map(|t| t.to_ascii_lowercase()),
                force: args.flag("force")?,
                enable_ai_review: args.flag("enable_ai_review")?,
            }),
            ProjectAction::Test => ProjectCall::Test {
                path,
                languages: args
                    .list("languages")?
                    .into_iter()
                    .map(|l| l.to_ascii_lowercase())
                    .collect(),
            },
        })
    }
}

impl SystemCall {
    fn parse(action: SystemAction, args: &Args) -> Result<Self> {
        Ok(match action {
            SystemAction::Bootstrap => SystemCall::Bootstrap,
            SystemAction::Restart => SystemCall::Restart { services: args.list("services")? },
            SystemAction::RestartInfra => SystemCall::RestartInfra,
            SystemAction::Rebuild => SystemCall::Rebuild {
                services: args.list("services")?,
                no_cache: args.flag("no_cache")?,
            },
            SystemAction::Stop => SystemCall::Stop { services: args.list("services")? },
            SystemAction::Start => SystemCall::Start { services: args.list("services")? },
            SystemAction::DockerLogs => SystemCall::DockerLogs(LogsRequest::new(
                args.opt_string("service")?,
                args.opt_u32("lines")?,
            )),
            SystemAction::DockerStatus => SystemCall::DockerStatus,
            SystemAction::Build => SystemCall::Build {
                services: args.list("services")?,
                no_cache: args.flag("no_cache")?,
            },
        })
    }
}

impl ShareCall {
    fn parse(action: ShareAction, args: &Args) -> Result<Self> {
        Ok(match action {
            ShareAction::Start => ShareCall::Start {
                name: args.name("name", "server")?,
                options: ShareOptions {
                    port: args.opt_port("port")?,
                    no_auth: args.flag("no_auth")?,
                },
            },
            ShareAction::Stop => ShareCall::Stop { name: args.name("name", "server")? },
            ShareAction::List => ShareCall::List,
        })
    }
}

impl Invocation {
    /// Validate a raw call; relative paths resolve against `root`
    pub fn parse(tool: &str, arguments: Map<String, Value>, root: &Path) -> Result<Self> {
        let tool_name = ToolName::parse(tool).ok_or_else(|| {
            GateError::validation(format!(
                "Unknown tool '{}'. Known tools: {}",
                tool,
                ToolName::names().join(", ")
            ))
        })?;
        let args = Args::new(arguments);

        match tool_name {
            ToolName::Server => {
                let action = action_of(tool_name, &args, ServerAction::parse)?;
                ServerCall::parse(action, &args)
                    .map(Invocation::Server)
                    .map_err(scoped(tool_name, action.as_str()))
            }
            ToolName::Profile => {
                let action = action_of(tool_name, &args, ProfileAction::parse)?;
                ProfileCall::parse(action, &args, root)
                    .map(Invocation::Profile)
                    .map_err(scoped(tool_name, action.as_str()))
            }
            ToolName::Client => {
                let action = action_of(tool_name, &args, ClientAction::parse)?;
                ClientCall::parse(action, &args)
                    .map(Invocation::Client)
                    .map_err(scoped(tool_name, action.as_str()))
            }
            ToolName::Config => {
                let action = action_of(tool_name, &args, ConfigAction::parse)?;
                ConfigCall::parse(action, &args)
                    .map(Invocation::Config)
                    .map_err(scoped(tool_name, action.as_str()))
            }
            ToolName::Project => {
                let action = action_of(tool_name, &args, ProjectAction::parse)?;
                ProjectCall::parse(action, &args, root)
                    .map(Invocation::Project)
                    .map_err(scoped(tool_name, action.as_str()))
            }
            ToolName::System => {
                let action = action_of(tool_name, &args, SystemAction::parse)?;
                SystemCall::parse(action, &args)
                    .map(Invocation::System)
                    .map_err(scoped(tool_name, action.as_str()))
            }
            ToolName::Share => {
                let action = action_of(tool_name, &args, ShareAction::parse)?;
                ShareCall::parse(action, &args)
                    .map(Invocation::Share)
                    .map_err(scoped(tool_name, action.as_str()))
            }
            ToolName::Status => Ok(Invocation::Status),
        }
    }

    pub fn tool(&self) -> ToolName {
        match self {
            Invocation::Server(_) => ToolName::Server,
            Invocation::Profile(_) => ToolName::Profile,
            Invocation::Client(_) => ToolName::Client,
            Invocation::Config(_) => ToolName::Config,
            Invocation::Project(_) => ToolName::Project,
            Invocation::System(_) => ToolName::System,
            Invocation::Share(_) => ToolName::Share,
            Invocation::Status => ToolName::Status,
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            Invocation::Server(call) => match call {
                ServerCall::List => ServerAction::List,
                ServerCall::Info { .. } => ServerAction::Info,
                ServerCall::Install { .. } => ServerAction::Install,
                ServerCall::Uninstall { .. } => ServerAction::Uninstall,
                ServerCall::Search { .. } => ServerAction::Search,
                ServerCall::Create(_) => ServerAction::Create,
                ServerCall::Edit(_) => ServerAction::Edit,
            }
            .as_str(),
            Invocation::Profile(call) => match call {
                ProfileCall::List => ProfileAction::List,
                ProfileCall::Create { .. } => ProfileAction::Create,
                ProfileCall::Edit { .. } => ProfileAction::Edit,
                ProfileCall::Delete { .. } => ProfileAction::Delete,
                ProfileCall::Suggest { .. } => ProfileAction::Suggest,
                ProfileCall::Restart { .. } => ProfileAction::Restart,
            }
            .as_str(),
            Invocation::Client(call) => match call {
                ClientCall::List => ClientAction::List,
                ClientCall::Edit { .. } => ClientAction::Edit,
            }
            .as_str(),
            Invocation::Config(call) => match call {
                ConfigCall::Get { .. } => ConfigAction::Get,
                ConfigCall::Set { .. } => ConfigAction::Set,
                ConfigCall::List => ConfigAction::List,
                ConfigCall::Migrate => ConfigAction::Migrate,
                ConfigCall::Export { .. } => ConfigAction::Export,
                ConfigCall::Import(_) => ConfigAction::Import,
            }
            .as_str(),
            Invocation::Project(call) => match call {
                ProjectCall::Analyze { .. } => ProjectAction::Analyze,
                ProjectCall::Diff { .. } => ProjectAction::Diff,
                ProjectCall::Devops(_) => ProjectAction::Devops,
                ProjectCall::Test { .. } => ProjectAction::Test,
            }
            .as_str(),
            Invocation::System(call) => match call {
                SystemCall::Bootstrap => SystemAction::Bootstrap,
                SystemCall::Restart { .. } => SystemAction::Restart,
                SystemCall::RestartInfra => SystemAction::RestartInfra,
                SystemCall::Rebuild { .. } => SystemAction::Rebuild,
                SystemCall::Stop { .. } => SystemAction::Stop,
                SystemCall::Start { .. } => SystemAction::Start,
                SystemCall::DockerLogs(_) => SystemAction::DockerLogs,
                SystemCall::DockerStatus => SystemAction::DockerStatus,
                SystemCall::Build { .. } => SystemAction::Build,
            }
            .as_str(),
            Invocation::Share(call) => match call {
                ShareCall::Start { .. } => ShareAction::Start,
                ShareCall::Stop { .. } => ShareAction::Stop,
                ShareCall::List => ShareAction::List,
            }
            .as_str(),
            Invocation::Status => "status",
        }
    }

    /// Calls that run under the long deadline
    pub fn is_long_running(&self) -> bool {
        matches!(
            self,
            Invocation::System(
                SystemCall::Bootstrap
                    | SystemCall::RestartInfra
                    | SystemCall::Rebuild { .. }
                    | SystemCall::Build { .. }
            ) | Invocation::Project(ProjectCall::Test { .. })
        )
    }
}

/// Prefix argument errors with the tool and action they belong to
fn scoped(tool: ToolName, action: &'static str) -> impl FnOnce(GateError) -> GateError {
    move |e| e.context(format!("{} {}", tool, action))
}
