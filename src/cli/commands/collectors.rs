use crate::collectors::{COLLECTOR_NAMES, all_factories};
use clap::{Arg, ArgAction, Command};

/// Adds `--collector.<name>` / `--no-collector.<name>` for every collector.
pub fn add_collectors_args(mut cmd: Command) -> Command {
    let factories = all_factories();

    for &name in COLLECTOR_NAMES {
        let Some(collector) = factories.get(name).map(|factory| factory()) else {
            continue;
        };
        let default_enabled = collector.enabled_by_default();

        // clap wants 'static ids; these are built once at startup.
        let enable_flag: &'static str = Box::leak(format!("collector.{name}").into_boxed_str());
        let disable_flag: &'static str = Box::leak(format!("no-collector.{name}").into_boxed_str());

        let default_indicator = if default_enabled {
            "enabled"
        } else {
            "disabled"
        };
        let enable_help = format!(
            "Enable the {name} collector [default: {default_indicator}, {}]",
            collector.schedule().label()
        );
        let disable_help = format!("Disable the {name} collector");

        cmd = cmd
            .arg(
                Arg::new(enable_flag)
                    .long(enable_flag)
                    .help(enable_help)
                    .action(ArgAction::SetTrue)
                    .default_value(if default_enabled { "true" } else { "false" }),
            )
            .arg(
                Arg::new(disable_flag)
                    .long(disable_flag)
                    .help(disable_help)
                    .action(ArgAction::SetTrue)
                    .overrides_with(enable_flag),
            );
    }
    cmd
}
