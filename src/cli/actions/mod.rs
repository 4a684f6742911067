pub mod run;

use crate::database::TargetConfig;

#[derive(Debug)]
pub enum Action {
    Run {
        port: u16,
        listen: Option<String>,
        target: TargetConfig,
        collectors: Vec<String>,
    },
}
