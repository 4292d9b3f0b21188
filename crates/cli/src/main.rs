use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use flowparams_engine::{
    DeferredParameterReference, EngineSettings, ParameterOwner, Resolvable, RunContext, WorkflowParameters, load_run_configuration,
    merge_for_step, parse_parameter_file,
};
use serde_json::{Map as JsonMap, Value};
use tracing::debug;

fn main() -> Result<()> {
    init_tracing();
    let matches = build_cli().get_matches();

    match matches.subcommand() {
        Some(("merge", sub)) => run_merge(sub),
        Some(("dump", sub)) => run_dump(sub),
        Some(("resolve", sub)) => run_resolve(sub),
        _ => anyhow::bail!("expected one of: merge, dump, resolve"),
    }
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn build_cli() -> Command {
    let file_arg = || {
        Arg::new("file")
            .required(true)
            .value_parser(value_parser!(PathBuf))
            .help("Path to the parameter document (YAML or JSON)")
    };
    let conf_arg = || {
        Arg::new("conf")
            .long("conf")
            .action(ArgAction::Set)
            .value_parser(value_parser!(PathBuf))
            .help("Run configuration file (YAML or JSON mapping)")
    };
    let step_arg = || Arg::new("step").long("step").action(ArgAction::Set).help("Step whose parameters are layered on top");

    Command::new("flowparams")
        .about("Merge and resolve layered workflow parameters")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("merge")
                .about("Merge workflow, step, and run parameters and print the validated mapping")
                .arg(file_arg())
                .arg(step_arg())
                .arg(conf_arg())
                .arg(
                    Arg::new("lenient")
                        .long("lenient")
                        .action(ArgAction::SetTrue)
                        .help("Replace missing or invalid values with null instead of failing"),
                )
                .arg(
                    Arg::new("run-conf-overrides")
                        .long("run-conf-overrides")
                        .action(ArgAction::Set)
                        .value_parser(parse_override_flag)
                        .help("Override the settings switch for run configuration precedence (true/false)"),
                ),
        )
        .subcommand(
            Command::new("dump")
                .about("Print the best-effort values of the workflow or a step")
                .arg(file_arg())
                .arg(step_arg()),
        )
        .subcommand(
            Command::new("resolve")
                .about("Resolve a single deferred parameter reference")
                .arg(file_arg())
                .arg(Arg::new("name").required(true).help("Parameter name"))
                .arg(
                    Arg::new("default")
                        .long("default")
                        .action(ArgAction::Set)
                        .help("Reference default as a JSON literal"),
                )
                .arg(conf_arg()),
        )
}

fn parse_override_flag(raw: &str) -> Result<bool, String> {
    flowparams_util::parse_flag(raw).ok_or_else(|| format!("expected true/false/1/0/yes/no, got '{raw}'"))
}

fn load_workflow(file: &Path) -> Result<WorkflowParameters> {
    let document = parse_parameter_file(file)?;
    Ok(WorkflowParameters::from_document(&document))
}

fn load_conf(conf: Option<&Path>) -> Result<Option<JsonMap<String, Value>>> {
    conf.map(load_run_configuration).transpose()
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn file_arg(matches: &ArgMatches) -> Result<&Path> {
    matches
        .get_one::<PathBuf>("file")
        .map(PathBuf::as_path)
        .context("missing parameter document path")
}

fn run_merge(matches: &ArgMatches) -> Result<()> {
    let mut settings = EngineSettings::load().context("Failed to load engine settings")?;
    if let Some(flag) = matches.get_one::<bool>("run-conf-overrides") {
        debug!(value = *flag, "overriding settings from command line");
        settings.run_configuration_overrides_parameters = *flag;
    }

    let merged = merge_document(
        file_arg(matches)?,
        matches.get_one::<String>("step").map(String::as_str),
        matches.get_one::<PathBuf>("conf").map(PathBuf::as_path),
        &settings,
        matches.get_flag("lenient"),
    )?;
    print_json(&Value::Object(merged))
}

fn run_dump(matches: &ArgMatches) -> Result<()> {
    let dumped = dump_document(file_arg(matches)?, matches.get_one::<String>("step").map(String::as_str))?;
    print_json(&Value::Object(dumped))
}

fn run_resolve(matches: &ArgMatches) -> Result<()> {
    let name = matches.get_one::<String>("name").context("missing parameter name")?;
    let default = matches
        .get_one::<String>("default")
        .map(|raw| serde_json::from_str::<Value>(raw).with_context(|| format!("--default is not valid JSON: {raw}")))
        .transpose()?;

    let value = resolve_document(
        file_arg(matches)?,
        name,
        default,
        matches.get_one::<PathBuf>("conf").map(PathBuf::as_path),
    )?;
    print_json(&value)
}

/// Merges workflow, step, and run parameters of the document at `file`.
fn merge_document(
    file: &Path,
    step: Option<&str>,
    conf: Option<&Path>,
    settings: &EngineSettings,
    lenient: bool,
) -> Result<JsonMap<String, Value>> {
    let workflow = load_workflow(file)?;
    let run_configuration = load_conf(conf)?;

    if let Some(step_id) = step
        && workflow.step_parameters(step_id).is_none()
    {
        debug!(workflow = %workflow.workflow_id(), step = %step_id, "step declares no parameters");
    }

    merge_for_step(&workflow, step, run_configuration.as_ref(), settings, lenient)
        .with_context(|| format!("Failed to merge parameters for workflow {}", workflow.workflow_id()))
}

/// Best-effort values of the workflow, or of `step` when given.
fn dump_document(file: &Path, step: Option<&str>) -> Result<JsonMap<String, Value>> {
    let workflow = load_workflow(file)?;
    let collection = match step {
        Some(step_id) => workflow
            .step_parameters(step_id)
            .with_context(|| format!("step '{}' declares no parameters in workflow {}", step_id, workflow.workflow_id()))?,
        None => workflow.parameters(),
    };
    Ok(collection.dump_all())
}

/// Declares a reference to `name` on the loaded workflow and resolves it against the run configuration and the
/// workflow's dumped parameters.
fn resolve_document(file: &Path, name: &str, default: Option<Value>, conf: Option<&Path>) -> Result<Value> {
    let mut workflow = load_workflow(file)?;
    let run_configuration = load_conf(conf)?;

    let reference = DeferredParameterReference::new(&mut workflow, name, default)
        .with_context(|| format!("Failed to declare reference to {name}"))?;
    let context = RunContext::new(run_configuration, workflow.parameters().dump_all());
    Ok(reference.resolve(&context)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        build_cli().debug_assert();
    }

    #[test]
    fn merge_arguments_parse() {
        let matches = build_cli()
            .try_get_matches_from(["flowparams", "merge", "params.yaml", "--step", "load", "--lenient", "--run-conf-overrides", "no"])
            .expect("valid arguments");
        let (name, sub) = matches.subcommand().expect("subcommand");

        assert_eq!(name, "merge");
        assert_eq!(sub.get_one::<String>("step").map(String::as_str), Some("load"));
        assert!(sub.get_flag("lenient"));
        assert_eq!(sub.get_one::<bool>("run-conf-overrides"), Some(&false));
    }

    #[test]
    fn override_flag_rejects_unknown_words() {
        assert!(
            build_cli()
                .try_get_matches_from(["flowparams", "merge", "params.yaml", "--run-conf-overrides", "maybe"])
                .is_err()
        );
    }

    const DOCUMENT: &str = r#"
workflow: nightly_etl
params:
  environment:
    default: staging
    schema: { type: string, enum: [staging, production] }
  retries: 3
  owner:
    description: Team on call
steps:
  load:
    retries: { default: 5, schema: { type: integer, minimum: 0 } }
"#;

    fn write_fixture(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn merge_document_layers_step_and_conf() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = write_fixture(temp_dir.path(), "params.yaml", DOCUMENT);
        let conf = write_fixture(temp_dir.path(), "conf.json", r#"{"environment": "production", "owner": "data"}"#);

        let merged = merge_document(&file, Some("load"), Some(&conf), &EngineSettings::default(), false).unwrap();
        assert_eq!(
            Value::Object(merged),
            serde_json::json!({"environment": "production", "retries": 5, "owner": "data"})
        );

        let disabled = EngineSettings {
            run_configuration_overrides_parameters: false,
        };
        let lenient = merge_document(&file, Some("load"), Some(&conf), &disabled, true).unwrap();
        assert_eq!(lenient["environment"], serde_json::json!("staging"));
        assert_eq!(lenient["owner"], Value::Null);

        let error = merge_document(&file, None, None, &EngineSettings::default(), false).unwrap_err();
        assert!(format!("{error:#}").contains("Invalid input for param owner"));
    }

    #[test]
    fn dump_document_selects_workflow_or_step() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = write_fixture(temp_dir.path(), "params.yaml", DOCUMENT);

        let workflow = dump_document(&file, None).unwrap();
        assert_eq!(
            Value::Object(workflow),
            serde_json::json!({"environment": "staging", "retries": 3, "owner": null})
        );

        let step = dump_document(&file, Some("load")).unwrap();
        assert_eq!(Value::Object(step), serde_json::json!({"retries": 5}));
    }

    #[test]
    fn dump_document_rejects_undeclared_step() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = write_fixture(temp_dir.path(), "params.yaml", DOCUMENT);

        let error = dump_document(&file, Some("extract")).unwrap_err();
        assert!(error.to_string().contains("step 'extract' declares no parameters in workflow nightly_etl"));
    }

    #[test]
    fn resolve_document_follows_reference_precedence() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = write_fixture(temp_dir.path(), "params.yaml", DOCUMENT);
        let conf = write_fixture(temp_dir.path(), "conf.yaml", "retries: 9\n");

        assert_eq!(resolve_document(&file, "retries", Some(serde_json::json!(4)), Some(&conf)).unwrap(), 9);
        assert_eq!(resolve_document(&file, "retries", Some(serde_json::json!(4)), None).unwrap(), 4);
        assert_eq!(resolve_document(&file, "retries", None, None).unwrap(), 3);
        assert_eq!(resolve_document(&file, "owner", None, None).unwrap(), Value::Null);

        let error = resolve_document(&file, "region", None, None).unwrap_err();
        assert!(error.to_string().contains("No value could be resolved for parameter region"));
    }

    #[test]
    fn resolve_document_rejects_default_violating_schema() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = write_fixture(temp_dir.path(), "params.yaml", DOCUMENT);

        let error = resolve_document(&file, "environment", Some(serde_json::json!("qa")), None).unwrap_err();
        assert!(format!("{error:#}").contains("Invalid input for param environment"));
    }
}
