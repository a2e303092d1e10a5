//! `lazycfg` command-line tool
//!
//! Loads a config (source or saved form), applies `--set` overrides and
//! prints, queries or saves the result.

use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use lazycfg_engine::{to_yaml_value, ConfigPath, ConfigTree, EngineOptions, LazyConfig};
use tracing::debug;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

fn config_arg() -> Arg {
    Arg::new("config")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Config source file, or a saved .yaml file")
}

fn set_arg() -> Arg {
    Arg::new("set")
        .long("set")
        .short('s')
        .value_name("KEY=VALUE")
        .action(ArgAction::Append)
        .help("Override applied after loading (repeatable)")
}

fn cli() -> Command {
    Command::new("lazycfg")
        .version(lazycfg_engine::VERSION)
        .about("Inspect, override and save lazy config trees")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::Count)
                .global(true)
                .help("Raise the log level (-v info, -vv debug, -vvv trace)"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Write log events to stderr as JSON lines"),
        )
        .arg(
            Arg::new("line-width")
                .long("line-width")
                .value_parser(value_parser!(usize))
                .global(true)
                .help("Maximum line width of printed source"),
        )
        .arg(
            Arg::new("sidecar-suffix")
                .long("sidecar-suffix")
                .global(true)
                .help("Suffix naming the sidecar archive of a saved file"),
        )
        .subcommand(
            Command::new("show")
                .about("Print the config as source")
                .arg(config_arg())
                .arg(set_arg()),
        )
        .subcommand(
            Command::new("get")
                .about("Print one sub-tree as YAML")
                .arg(config_arg())
                .arg(Arg::new("path").required(true).help("Dotted path, e.g. model.backbone"))
                .arg(set_arg())
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(
            Command::new("save")
                .about("Write the saved form (YAML plus sidecar)")
                .arg(config_arg())
                .arg(
                    Arg::new("dest")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Destination .yaml file"),
                )
                .arg(set_arg()),
        )
        .subcommand(
            Command::new("check")
                .about("Load a config and report its size")
                .arg(config_arg()),
        )
}

fn init_logging(verbosity: u8, json: bool) {
    let level = match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    let filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}

fn engine_options(args: &ArgMatches) -> EngineOptions {
    let mut options = EngineOptions::default();
    if let Some(width) = args.get_one::<usize>("line-width") {
        options = options.with_line_width(*width);
    }
    if let Some(suffix) = args.get_one::<String>("sidecar-suffix") {
        options = options.with_sidecar_suffix(suffix.clone());
    }
    options
}

fn load_tree(engine: &LazyConfig, args: &ArgMatches) -> Result<ConfigTree> {
    let path = args.get_one::<PathBuf>("config").context("missing config path")?;
    let mut tree = engine
        .load(path)
        .with_context(|| format!("failed to load {}", path.display()))?;

    let overrides: Vec<&String> = args
        .try_get_many::<String>("set")
        .ok()
        .flatten()
        .map(|values| values.collect())
        .unwrap_or_default();
    if !overrides.is_empty() {
        LazyConfig::apply_overrides(&mut tree, &overrides).context("failed to apply overrides")?;
        debug!(count = overrides.len(), "applied overrides");
    }
    Ok(tree)
}

fn run(matches: &ArgMatches, out: &mut dyn Write) -> Result<()> {
    let Some((command, args)) = matches.subcommand() else {
        bail!("no command given");
    };
    let engine = LazyConfig::new(engine_options(args));

    match command {
        "show" => {
            let tree = load_tree(&engine, args)?;
            write!(out, "{}", engine.to_source(&tree))?;
        }
        "get" => {
            let tree = load_tree(&engine, args)?;
            let key = args.get_one::<String>("path").context("missing path")?;
            let path: ConfigPath = key.parse().with_context(|| format!("invalid path '{key}'"))?;
            let value = tree.read_path(&path).with_context(|| format!("cannot read '{key}'"))?;
            let yaml = to_yaml_value(&value)?;
            if args.get_flag("json") {
                writeln!(out, "{}", serde_json::to_string_pretty(&yaml)?)?;
            } else {
                write!(out, "{}", serde_yaml::to_string(&yaml)?)?;
            }
        }
        "save" => {
            let tree = load_tree(&engine, args)?;
            let dest = args.get_one::<PathBuf>("dest").context("missing destination")?;
            let report = engine
                .save(&tree, dest)
                .with_context(|| format!("failed to save {}", dest.display()))?;
            writeln!(out, "saved {}", report.path.display())?;
            if let Some(sidecar) = &report.sidecar {
                writeln!(out, "sidecar {}", sidecar.display())?;
            }
            for notice in &report.notices {
                writeln!(out, "note: {notice}")?;
            }
        }
        "check" => {
            let tree = load_tree(&engine, args)?;
            let path = args.get_one::<PathBuf>("config").context("missing config path")?;
            writeln!(
                out,
                "{}: {} keys, {} deferred calls",
                path.display(),
                tree.len(),
                tree.call_count()
            )?;
        }
        other => bail!("unknown command '{other}'"),
    }
    Ok(())
}

fn main() -> ExitCode {
    let matches = cli().get_matches();
    let verbosity = matches
        .subcommand()
        .map_or(0, |(_, args)| args.get_count("verbose"))
        .max(matches.get_count("verbose"));
    let json = matches.get_flag("log-json")
        || matches.subcommand().is_some_and(|(_, args)| args.get_flag("log-json"));
    init_logging(verbosity, json);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match run(&matches, &mut out) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lazycfg_test_utils::{tree_with_opaque, Fixture};
    use pretty_assertions::assert_eq;

    fn exec(args: &[&str]) -> Result<String> {
        let matches = cli().try_get_matches_from(std::iter::once("lazycfg").chain(args.iter().copied()))?;
        let mut out = Vec::new();
        run(&matches, &mut out)?;
        Ok(String::from_utf8(out)?)
    }

    fn root(fixture: &Fixture) -> String {
        fixture.root().display().to_string()
    }

    #[test]
    fn command_is_well_formed() {
        cli().debug_assert();
    }

    #[test]
    fn show_applies_overrides() {
        let fixture = Fixture::new();
        let text = exec(&["show", &root(&fixture), "--set", "lazyobj.x=1", "-s", "dir1b_dict.b=3"]).unwrap();
        assert_eq!(
            text,
            "cfg.dir1a_dict.a = \"modified\"\ncfg.dir1a_dict.b = 2\ncfg.dir1b_dict.a = 1\ncfg.dir1b_dict.b = 3\n\
             cfg.lazyobj = itertools.count(x=1, y=\"base_a_1_from_b\")\n"
        );
    }

    #[test]
    fn get_prints_yaml_or_json() {
        let fixture = Fixture::new();
        assert_eq!(exec(&["get", &root(&fixture), "dir1a_dict"]).unwrap(), "a: modified\nb: 2\n");
        assert_eq!(
            exec(&["get", &root(&fixture), "dir1a_dict", "--json"]).unwrap(),
            "{\n  \"a\": \"modified\",\n  \"b\": 2\n}\n"
        );
        assert_eq!(
            exec(&["get", &root(&fixture), "lazyobj"]).unwrap(),
            "_target_: itertools.count\nx: base_a_1\ny: base_a_1_from_b\n"
        );
        assert_eq!(exec(&["get", &root(&fixture), "lazyobj._target_"]).unwrap(), "itertools.count\n");
        let err = exec(&["get", &root(&fixture), "lazyobj.z"]).unwrap_err();
        assert!(format!("{err:#}").contains("cannot read 'lazyobj.z'"));
    }

    #[test]
    fn save_then_check() {
        let fixture = Fixture::new();
        let dest = fixture.path("saved.yaml").display().to_string();
        let text = exec(&["save", &root(&fixture), &dest, "--set", "lazyobj.y=2"]).unwrap();
        assert_eq!(text, format!("saved {dest}\n"));

        let report = exec(&["check", &dest]).unwrap();
        assert_eq!(report, format!("{dest}: 3 keys, 1 deferred calls\n"));
        assert_eq!(exec(&["get", &dest, "lazyobj.y"]).unwrap(), "2\n");
    }

    #[test]
    fn save_reports_sidecar() {
        let fixture = Fixture::empty();
        let seed = fixture.path("seed.yaml");
        let engine = LazyConfig::new(EngineOptions::new().with_sidecar_suffix(".blobs"));
        engine.save(&tree_with_opaque(), &seed).unwrap();

        let dest = fixture.path("copy.yaml").display().to_string();
        let text = exec(&["save", &seed.display().to_string(), &dest, "--sidecar-suffix", ".blobs"]).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], format!("saved {dest}"));
        assert_eq!(lines[1], format!("sidecar {dest}.blobs"));
        assert!(lines[2].starts_with("note: 'train.schedule' (function)"));
    }

    #[test]
    fn failures_carry_context() {
        let fixture = Fixture::new();
        let err = exec(&["show", &root(&fixture), "--set", "lazyobj.x.xxx=1"]).unwrap_err();
        let message = format!("{err:#}");
        assert!(message.starts_with("failed to apply overrides"));
        assert!(message.contains("no 'xxx'"));

        let err = exec(&["check", &fixture.path("absent.py").display().to_string()]).unwrap_err();
        assert!(format!("{err:#}").starts_with("failed to load"));
    }

    #[test]
    fn verbosity_counts() {
        let matches = cli().try_get_matches_from(["lazycfg", "-vv", "check", "x.py"]).unwrap();
        assert_eq!(matches.get_count("verbose"), 2);
        let matches = cli().try_get_matches_from(["lazycfg", "check", "x.py", "-v"]).unwrap();
        let (_, args) = matches.subcommand().unwrap();
        assert_eq!(args.get_count("verbose"), 1);
    }
}
