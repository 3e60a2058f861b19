use envbind::{docs, format_errors, Env, Load, Options};
use std::{collections::HashMap, time::Duration};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default, Env)]
pub struct Database {
    #[env(key = "HOST", default = "localhost")]
    pub host: String,

    #[env(key = "PORT", default = 5432)]
    pub port: u16,
}

#[derive(Debug, Default, Env)]
pub struct Worker {
    #[env(key = "NAME,notEmpty")]
    pub name: String,

    #[env(key = "THREADS", default = 1)]
    pub threads: usize,
}

#[derive(Debug, Default, Env)]
pub struct WorkingConfig {
    #[env(key = "TEST_STRING,required", default = "test")]
    pub test_string: String,

    #[env(key = "TEST_INT", default = 123)]
    pub test_int: i32,

    #[env(key = "TEST_BOOL", default = true)]
    pub test_bool: bool,

    #[env(key = "TEST_TIMEOUT", default = "30s")]
    pub timeout: Duration,

    #[env(key = "TEST_HOME_URL,expand", default = "http://${TEST_STRING}.local")]
    pub home_url: String,

    #[env(key = "TEST_OPTIONAL")]
    pub test_optional: Option<i32>,

    #[env(prefix = "DB_")]
    pub database: Database,

    #[env(prefix = "WORKER_")]
    pub workers: Vec<Worker>,

    #[env(prefix = "REPLICA_")]
    pub replicas: HashMap<String, Database>,
}

#[derive(Debug, Default, Env)]
pub struct ErrorConfig {
    #[env(key = "ERROR_TEST_STRING,required")]
    pub test_string: String,

    #[env(key = "ERROR_TEST_INT", default = 42)]
    pub test_int: i32,

    #[env(key = "TEST_WRONG_TYPE", default = 42)]
    pub test_wrong_type: i32,

    #[env(key = "ERROR_TEST_BOOL", default = "maybe")]
    pub test_bool: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    dotenvy::from_filename("./test.env").ok();
    match std::env::args().nth(1) {
        Some(arg) => match arg.as_str() {
            "default" => test_with_config(),
            "error" => test_with_config_error(),
            "error_result" => test_with_config_error_result(),
            "docs" => generate_docs(),
            "params" => show_params(),
            "trace" => trace_sources(),
            _ => println!(
                "unknown arg: {}. Available: default, error, error_result, docs, params, trace",
                arg
            ),
        },
        None => {
            println!("Usage: envbind-demo [command]");
            println!("Commands:");
            println!("  default      - Bind WorkingConfig from the environment");
            println!("  error        - Bind ErrorConfig and panic with every error");
            println!("  error_result - Bind ErrorConfig and print the errors");
            println!("  docs         - Generate CONFIG.md documentation");
            println!("  params       - Show the binding parameters of every field");
            println!("  trace        - Show where each value came from");
        }
    };
}

fn test_with_config() {
    let config = WorkingConfig::load();
    println!("Config loaded successfully!");
    println!("  test_string: {}", config.test_string);
    println!("  test_int: {}", config.test_int);
    println!("  test_bool: {}", config.test_bool);
    println!("  timeout: {:?}", config.timeout);
    println!("  home_url: {}", config.home_url);
    println!("  database: {}:{}", config.database.host, config.database.port);
    for (i, worker) in config.workers.iter().enumerate() {
        println!("  worker {}: {} x{}", i, worker.name, worker.threads);
    }
    for (name, replica) in &config.replicas {
        println!("  replica {}: {}:{}", name, replica.host, replica.port);
    }
}

fn test_with_config_error() {
    let _config = ErrorConfig::load();
    println!("you should not see this");
}

fn test_with_config_error_result() {
    match ErrorConfig::parse() {
        Ok(config) => {
            println!("Config loaded successfully!");
            println!("  test_string: {}", config.test_string);
            println!("  test_int: {}", config.test_int);
        }
        Err(errors) => {
            eprintln!("{}", format_errors(&errors));
        }
    }
    println!("all done");
}

fn generate_docs() {
    println!("Generating documentation for WorkingConfig...");
    let params = match WorkingConfig::field_params() {
        Ok(params) => params,
        Err(errors) => {
            eprintln!("{}", format_errors(&errors));
            return;
        }
    };
    match docs::write_docs(&params, "CONFIG.md") {
        Ok(_) => println!("✓ Documentation written to CONFIG.md"),
        Err(e) => eprintln!("✗ Failed to write documentation: {}", e),
    }
}

fn show_params() {
    println!("WorkingConfig binding parameters:");
    match WorkingConfig::field_params() {
        Ok(params) => {
            for field in params {
                println!("  {}:", field.key);
                println!("    required: {}", field.required);
                if let Some(default) = &field.default_value {
                    println!("    default: {}", default);
                }
                if !field.options().is_empty() {
                    println!("    options: {}", field.options().join(", "));
                }
            }
        }
        Err(errors) => eprintln!("{}", format_errors(&errors)),
    }
}

fn trace_sources() {
    let options = Options::new().on_set(|key, _value, is_default| {
        let source = if is_default { "default" } else { "environment" };
        println!("  {} <- {}", key, source);
    });
    if let Err(errors) = WorkingConfig::parse_with(options) {
        eprintln!("{}", format_errors(&errors));
    }
}
