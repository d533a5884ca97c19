// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    clap::{Arg, ArgMatches, Command},
    linux_packaging::{
        build_package, error::PackageError, manifest::PackageManifest, packager::PackagerRegistry,
    },
    log::LevelFilter,
    once_cell::sync::Lazy,
    regex::{Captures, Regex},
    std::path::Path,
    thiserror::Error,
};

/// Example config written by the `init` command.
const EXAMPLE_CONFIG: &str = include_str!("package.yaml.example");

/// Matches `$$`, `${VAR}`, and `$VAR` references in config file content.
static ENV_VAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$(?:(\$)|\{([A-Za-z_][A-Za-z0-9_]*)\}|([A-Za-z_][A-Za-z0-9_]*))").unwrap()
});

#[derive(Debug, Error)]
pub enum LpbError {
    #[error("argument parsing error: {0:?}")]
    Clap(#[from] clap::Error),

    #[error("{0}")]
    Package(#[from] PackageError),

    #[error("I/O error: {0:?}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0:?}")]
    SerdeYaml(#[from] serde_yaml::Error),

    #[error("invalid sub-command: {0}")]
    InvalidSubCommand(String),

    #[error("cannot derive a package format from target path: {0}")]
    UnknownTargetFormat(String),

    #[error("refusing to overwrite existing config file: {0}")]
    ConfigFileExists(String),
}

pub type Result<T> = std::result::Result<T, LpbError>;

pub fn run_cli() -> Result<()> {
    let app = Command::new("Linux Package Builder")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Gregory Szorc <gregory.szorc@gmail.com>")
        .about("Build Linux packages from a YAML manifest")
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .multiple_occurrences(true)
                .help("Increase logging verbosity. Can be specified multiple times."),
        );

    let app = app.subcommand(
        Command::new("build")
            .about("Build a package from a config file")
            .alias("package")
            .arg(
                Arg::new("config")
                    .long("config")
                    .short('f')
                    .takes_value(true)
                    .default_value("package.yaml")
                    .help("Config file holding the package manifest"),
            )
            .arg(
                Arg::new("target")
                    .long("target")
                    .short('t')
                    .takes_value(true)
                    .required(true)
                    .help("Where to save the generated package; the file extension selects the format"),
            ),
    );

    let mut app = app.subcommand(
        Command::new("init").about("Create an example config file").arg(
            Arg::new("config")
                .long("config")
                .short('f')
                .takes_value(true)
                .default_value("package.yaml")
                .help("Path of the config file to create"),
        ),
    );

    let matches = app.clone().get_matches();

    let log_level = match matches.occurrences_of("verbose") {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_level.as_str()),
    );

    // Disable log context except at higher log levels.
    if log_level <= LevelFilter::Info {
        builder
            .format_timestamp(None)
            .format_level(false)
            .format_target(false);
    }

    builder.init();

    match matches.subcommand() {
        Some(("build", args)) => command_build(args),
        Some(("init", args)) => command_init(args),
        Some((command, _)) => Err(LpbError::InvalidSubCommand(command.to_string())),
        None => {
            app.print_help()?;
            Ok(())
        }
    }
}

fn command_build(args: &ArgMatches) -> Result<()> {
    let config_path = args.value_of("config").expect("config has a default value");
    let target = args.value_of("target").expect("target argument is required");

    let config = std::fs::read_to_string(config_path)?;
    let config = substitute_env_vars(&config);
    log::debug!("substituted config:\n{}", config);

    let manifest: PackageManifest = serde_yaml::from_str(&config)?;

    let format = target_format(target)?;
    log::info!("using {} packager", format);

    let registry = PackagerRegistry::default();

    let mut file = std::fs::File::create(target)?;
    build_package(&registry, manifest, format, &mut file)?;

    println!("created package: {}", target);

    Ok(())
}

fn command_init(args: &ArgMatches) -> Result<()> {
    let config_path = args.value_of("config").expect("config has a default value");

    if Path::new(config_path).exists() {
        return Err(LpbError::ConfigFileExists(config_path.to_string()));
    }

    std::fs::write(config_path, EXAMPLE_CONFIG)?;

    println!("created config file from example: {}", config_path);

    Ok(())
}

/// Derive the package format from a target path's file extension.
fn target_format(target: &str) -> Result<&str> {
    Path::new(target)
        .extension()
        .and_then(|extension| extension.to_str())
        .ok_or_else(|| LpbError::UnknownTargetFormat(target.to_string()))
}

/// Substitute environment variable references in config file content.
///
/// `$VAR` and `${VAR}` forms are recognized. References to unset variables
/// expand to the empty string. `$$` produces a literal `$`.
fn substitute_env_vars(content: &str) -> String {
    ENV_VAR_RE
        .replace_all(content, |caps: &Captures| {
            if caps.get(1).is_some() {
                "$".to_string()
            } else {
                let name = caps
                    .get(2)
                    .or_else(|| caps.get(3))
                    .expect("pattern requires a variable name when not an escape")
                    .as_str();

                std::env::var(name).unwrap_or_default()
            }
        })
        .into_owned()
}
