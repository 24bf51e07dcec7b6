use clap::{Parser, Subcommand};
use comfy_table::{Cell, Table as ComfyTable, presets::UTF8_FULL};
use config::{Config, Environment, File};
use postgrust_acl::parser::parse_signature;
use postgrust_acl::{
    AuthError, AuthState, AuthorizationManager, Grantee, NamedKind, ObjectType, Operation,
    PrivilegeType, TableKind, parse_actions, parse_object_ref, parse_object_refs, parse_object_type,
};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// PostgrustSQL privilege administration tool
#[derive(Parser, Debug)]
#[command(name = "pgr_acl")]
#[command(about = "Manage users, roles and privileges of a PostgrustSQL catalog", long_about = None)]
struct Args {
    /// Data directory (snapshot + journal)
    #[arg(short = 'D', long)]
    data_dir: Option<PathBuf>,

    /// Superuser created on first start
    #[arg(short = 'U', long)]
    root_user: Option<String>,

    /// Operations between automatic snapshots (0 disables them)
    #[arg(long)]
    snapshot_threshold: Option<usize>,

    /// Log level for the library (overridden by RUST_LOG)
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a catalog object: `create database db1`, `create table db1.t1`,
    /// `create function "db1.my_add(int,int)"`, `create "resource group" rg1`
    Create { kind: String, name: String },
    /// Remove a catalog object (grants on it are collected by `sweep`)
    Drop { kind: String, name: String },
    CreateUser { name: String },
    DropUser { name: String },
    CreateRole { name: String },
    DropRole { name: String },
    /// Grant privileges: `grant "select, insert" table alice --on "db1.*"`
    Grant {
        privileges: String,
        object_type: String,
        grantee: String,
        /// Objects (comma separated); empty for SYSTEM
        #[arg(long, default_value = "")]
        on: String,
        /// The grantee is a role
        #[arg(long)]
        role: bool,
        #[arg(long)]
        with_grant_option: bool,
        /// Act as this user and require the right to grant
        #[arg(long = "as")]
        as_user: Option<String>,
    },
    /// Revoke privileges (same arguments as `grant`)
    Revoke {
        privileges: String,
        object_type: String,
        grantee: String,
        #[arg(long, default_value = "")]
        on: String,
        #[arg(long)]
        role: bool,
        #[arg(long = "as")]
        as_user: Option<String>,
    },
    /// Grant a role to a user (or to a role with `--role`)
    GrantRole {
        role_name: String,
        grantee: String,
        #[arg(long)]
        role: bool,
    },
    RevokeRole {
        role_name: String,
        grantee: String,
        #[arg(long)]
        role: bool,
    },
    /// Check a single privilege: `check alice select table --on db1.t1`
    Check {
        user: String,
        privilege: String,
        object_type: String,
        #[arg(long, default_value = "")]
        on: String,
    },
    /// Show own privileges of a user (or a role with `--role`)
    ShowGrants {
        name: String,
        #[arg(long)]
        role: bool,
    },
    /// Remove privilege entries that refer to dropped objects
    Sweep,
    /// Write a snapshot and prune the journal
    Checkpoint,
    /// Write the whole state as JSON
    Dump { path: PathBuf },
    /// Interactive shell accepting the same commands
    Shell,
}

/// Одна строка интерактивного режима
#[derive(Parser, Debug)]
#[command(name = "pgr_acl", no_binary_name = true)]
struct ShellLine {
    #[command(subcommand)]
    command: Command,
}

/// Tool configuration
#[derive(Debug, Deserialize)]
#[serde(default)]
struct AclConfig {
    data_dir: PathBuf,
    snapshot_threshold: usize,
    root_user: String,
    log_level: String,
}

impl Default for AclConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            snapshot_threshold: 100,
            root_user: "root".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl AclConfig {
    /// Load configuration with priority: CLI args > ENV > config file > defaults
    fn load(args: &Args) -> Result<Self, AuthError> {
        let config_paths = ["./pgr_acl.toml", "/etc/postgrustsql/pgr_acl.toml"];

        let mut builder = Config::builder();
        if let Some(path) = config_paths.iter().find(|p| Path::new(p).exists()) {
            builder = builder.add_source(File::with_name(path));
        }
        builder = builder.add_source(Environment::with_prefix("PGR_ACL").try_parsing(true));

        let base = builder
            .build()
            .and_then(|c| c.try_deserialize::<Self>())
            .map_err(|e| AuthError::Config(e.to_string()))?;

        Ok(Self {
            data_dir: args.data_dir.clone().unwrap_or(base.data_dir),
            snapshot_threshold: args.snapshot_threshold.unwrap_or(base.snapshot_threshold),
            root_user: args.root_user.clone().unwrap_or(base.root_user),
            log_level: args.log_level.clone().unwrap_or(base.log_level),
        })
    }
}

fn grantee(name: &str, is_role: bool) -> Grantee {
    if is_role {
        Grantee::Role(name.to_string())
    } else {
        Grantee::User(name.to_string())
    }
}

/// `db.rest` -> (`db`, `rest`)
fn split_qualified(name: &str) -> Result<(String, &str), AuthError> {
    name.split_once('.')
        .map(|(db, rest)| (db.trim().to_string(), rest.trim()))
        .ok_or_else(|| AuthError::ParseError(format!("expected <database>.<name>, got '{name}'")))
}

fn create_operation(state: &AuthState, kind: ObjectType, name: &str) -> Result<Operation, AuthError> {
    if let Some(table_kind) = TableKind::from_object_type(kind) {
        let (database, table) = split_qualified(name)?;
        return Ok(Operation::CreateTable {
            database,
            name: table.to_string(),
            kind: table_kind,
            id: Uuid::new_v4(),
        });
    }
    if let Some(named) = NamedKind::from_object_type(kind) {
        return Ok(Operation::CreateNamed {
            kind: named,
            name: name.to_string(),
        });
    }
    match kind {
        ObjectType::Catalog => Ok(Operation::CreateCatalog {
            name: name.to_string(),
            id: state.catalog.next_id(),
        }),
        ObjectType::Database => Ok(Operation::CreateDatabase {
            name: name.to_string(),
            id: state.catalog.next_id(),
        }),
        ObjectType::Function => {
            let (database, signature) = split_qualified(name)?;
            Ok(Operation::CreateFunction {
                database: Some(database),
                signature: parse_signature(signature)?,
            })
        }
        ObjectType::GlobalFunction => Ok(Operation::CreateFunction {
            database: None,
            signature: parse_signature(name)?,
        }),
        ObjectType::User => Ok(Operation::CreateUser {
            name: name.to_string(),
        }),
        _ => Err(AuthError::ParseError(format!("cannot create objects of type {kind}"))),
    }
}

fn drop_operation(kind: ObjectType, name: &str) -> Result<Operation, AuthError> {
    if let Some(table_kind) = TableKind::from_object_type(kind) {
        let (database, table) = split_qualified(name)?;
        return Ok(Operation::DropTable {
            database,
            name: table.to_string(),
            kind: table_kind,
        });
    }
    if let Some(named) = NamedKind::from_object_type(kind) {
        return Ok(Operation::DropNamed {
            kind: named,
            name: name.to_string(),
        });
    }
    match kind {
        ObjectType::Catalog => Ok(Operation::DropCatalog {
            name: name.to_string(),
        }),
        ObjectType::Database => Ok(Operation::DropDatabase {
            name: name.to_string(),
        }),
        ObjectType::Function => {
            let (database, signature) = split_qualified(name)?;
            Ok(Operation::DropFunction {
                database: Some(database),
                signature: parse_signature(signature)?,
            })
        }
        ObjectType::GlobalFunction => Ok(Operation::DropFunction {
            database: None,
            signature: parse_signature(name)?,
        }),
        ObjectType::User => Ok(Operation::DropUser {
            name: name.to_string(),
        }),
        _ => Err(AuthError::ParseError(format!("cannot drop objects of type {kind}"))),
    }
}

fn run(manager: &AuthorizationManager, command: Command) -> Result<(), AuthError> {
    match command {
        Command::Create { kind, name } => {
            let kind = parse_object_type(&kind)?;
            manager.execute_with(|state| create_operation(state, kind, &name))?;
            println!("✓ CREATE {kind} {name}");
        }
        Command::Drop { kind, name } => {
            let kind = parse_object_type(&kind)?;
            manager.execute(drop_operation(kind, &name)?)?;
            println!("✓ DROP {kind} {name}");
        }
        Command::CreateUser { name } => {
            manager.execute(Operation::CreateUser { name: name.clone() })?;
            println!("✓ CREATE USER {name}");
        }
        Command::DropUser { name } => {
            manager.execute(Operation::DropUser { name: name.clone() })?;
            println!("✓ DROP USER {name}");
        }
        Command::CreateRole { name } => {
            manager.execute(Operation::CreateRole { name: name.clone() })?;
            println!("✓ CREATE ROLE {name}");
        }
        Command::DropRole { name } => {
            manager.execute(Operation::DropRole { name: name.clone() })?;
            println!("✓ DROP ROLE {name}");
        }
        Command::Grant {
            privileges,
            object_type,
            grantee: name,
            on,
            role,
            with_grant_option,
            as_user,
        } => {
            let object_type = parse_object_type(&object_type)?;
            let actions = parse_actions(object_type, &privileges)?;
            let objects = parse_object_refs(object_type, &on)?;
            let target = grantee(&name, role);
            manager.grant(
                as_user.as_deref(),
                &target,
                object_type,
                actions,
                &objects,
                with_grant_option,
            )?;
            println!("✓ GRANT {actions} ON {object_type} TO {target}");
        }
        Command::Revoke {
            privileges,
            object_type,
            grantee: name,
            on,
            role,
            as_user,
        } => {
            let object_type = parse_object_type(&object_type)?;
            let actions = parse_actions(object_type, &privileges)?;
            let objects = parse_object_refs(object_type, &on)?;
            let target = grantee(&name, role);
            manager.revoke(as_user.as_deref(), &target, object_type, actions, &objects)?;
            println!("✓ REVOKE {actions} ON {object_type} FROM {target}");
        }
        Command::GrantRole {
            role_name,
            grantee: name,
            role,
        } => {
            let target = grantee(&name, role);
            manager.execute(Operation::GrantRole {
                role: role_name.clone(),
                grantee: target.clone(),
            })?;
            println!("✓ GRANT ROLE {role_name} TO {target}");
        }
        Command::RevokeRole {
            role_name,
            grantee: name,
            role,
        } => {
            let target = grantee(&name, role);
            manager.execute(Operation::RevokeRole {
                role: role_name.clone(),
                grantee: target.clone(),
            })?;
            println!("✓ REVOKE ROLE {role_name} FROM {target}");
        }
        Command::Check {
            user,
            privilege,
            object_type,
            on,
        } => {
            let object_type = parse_object_type(&object_type)?;
            let action = PrivilegeType::from_name(&privilege)
                .ok_or_else(|| AuthError::ParseError(format!("unknown privilege '{privilege}'")))?;
            let object = parse_object_ref(object_type, &on)?;
            let allowed = manager.check(&user, object_type, action, &object)?;
            println!("{}", if allowed { "ALLOWED" } else { "DENIED" });
        }
        Command::ShowGrants { name, role } => {
            let rows = manager.show_grants(&grantee(&name, role))?;
            if rows.is_empty() {
                println!("(0 rows)");
                return Ok(());
            }
            let mut table = ComfyTable::new();
            table.load_preset(UTF8_FULL);
            table.set_header(vec!["Type", "Object", "Privileges", "Grantable"]);
            for row in &rows {
                table.add_row(vec![
                    Cell::new(row.object_type),
                    Cell::new(&row.object),
                    Cell::new(&row.actions),
                    Cell::new(if row.grantable { "YES" } else { "NO" }),
                ]);
            }
            println!("{table}\n({} rows)", rows.len());
        }
        Command::Sweep => {
            let removed = manager.sweep()?;
            println!("✓ Removed {removed} invalid privilege entries");
        }
        Command::Checkpoint => {
            manager.checkpoint()?;
            println!("✓ Checkpoint created");
        }
        Command::Dump { path } => {
            manager.dump_json(&path)?;
            println!("✓ State written to {}", path.display());
        }
        Command::Shell => shell(manager)?,
    }
    Ok(())
}

/// Разбивает строку на аргументы; двойные и одинарные кавычки группируют слова
fn split_args(line: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut has_token = false;

    for c in line.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), c) => current.push(c),
            (None, '"' | '\'') => {
                quote = Some(c);
                has_token = true;
            }
            (None, c) if c.is_whitespace() => {
                if has_token {
                    args.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            (None, c) => {
                current.push(c);
                has_token = true;
            }
        }
    }
    if has_token {
        args.push(current);
    }
    args
}

fn shell(manager: &AuthorizationManager) -> Result<(), AuthError> {
    let mut rl = DefaultEditor::new().map_err(|e| AuthError::Config(e.to_string()))?;

    let history_file = dirs::home_dir().map(|mut p| {
        p.push(".pgr_acl_history");
        p
    });
    if let Some(ref path) = history_file {
        let _ = rl.load_history(path);
    }

    println!("Type 'help' for command help, 'quit' or 'exit' to quit.\n");

    loop {
        match rl.readline("pgr_acl> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);

                match line {
                    "quit" | "exit" | "\\q" => break,
                    "help" | "\\?" => {
                        if let Err(e) = ShellLine::try_parse_from(["help"]) {
                            println!("{e}");
                        }
                        continue;
                    }
                    _ => {}
                }

                match ShellLine::try_parse_from(split_args(line)) {
                    Ok(ShellLine {
                        command: Command::Shell,
                    }) => println!("Already in the shell"),
                    Ok(parsed) => {
                        if let Err(e) = run(manager, parsed.command) {
                            println!("ERROR: {e}");
                        }
                    }
                    Err(e) => println!("{e}"),
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => {
                println!("Error: {e}");
                break;
            }
        }
    }

    if let Some(ref path) = history_file {
        let _ = rl.save_history(path);
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = AclConfig::load(&args)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("postgrust_acl={}", config.log_level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let manager = AuthorizationManager::open(
        &config.data_dir,
        &config.root_user,
        config.snapshot_threshold,
    )?;

    if let Err(e) = run(&manager, args.command) {
        eprintln!("ERROR: {e}");
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_args_quotes() {
        assert_eq!(
            split_args(r#"grant "select, insert" table alice --on 'db1.*'"#),
            vec!["grant", "select, insert", "table", "alice", "--on", "db1.*"]
        );
        assert_eq!(split_args(r#"check alice grant system --on """#).len(), 6);
    }

    #[test]
    fn test_shell_line_parses_subcommands() {
        let line = ShellLine::try_parse_from(split_args("grant-role analyst alice")).unwrap();
        assert!(matches!(line.command, Command::GrantRole { role: false, .. }));
    }

    #[test]
    fn test_create_operation_allocates_ids() {
        let state = AuthState::initialize("root");
        let op = create_operation(&state, ObjectType::Database, "db1").unwrap();
        assert_eq!(
            op,
            Operation::CreateDatabase {
                name: "db1".to_string(),
                id: state.catalog.next_id(),
            }
        );
        let op = create_operation(&state, ObjectType::Function, "db1.my_add(int, int)").unwrap();
        assert_eq!(
            op,
            Operation::CreateFunction {
                database: Some("db1".to_string()),
                signature: "my_add(INT,INT)".to_string(),
            }
        );
        assert!(create_operation(&state, ObjectType::Table, "t1").is_err());
        assert!(create_operation(&state, ObjectType::System, "x").is_err());
    }
}
