//! Scenario listing

use serde::Serialize;

use cloudprobe_e2e::Scenario;

use crate::output::{print_list, OutputFormat, TableDisplay};

#[derive(Debug, Serialize)]
pub struct ScenarioInfo {
    pub id: &'static str,
    pub default_name: &'static str,
    pub selects_region: bool,
    pub description: &'static str,
}

impl From<Scenario> for ScenarioInfo {
    fn from(scenario: Scenario) -> Self {
        Self {
            id: scenario.id(),
            default_name: scenario.default_name(),
            selects_region: scenario.selects_region(),
            description: scenario.description(),
        }
    }
}

impl TableDisplay for ScenarioInfo {
    fn headers() -> Vec<&'static str> {
        vec!["Scenario", "Default Name", "Region", "Description"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.default_name.to_string(),
            if self.selects_region { "yes" } else { "no" }.to_string(),
            self.description.to_string(),
        ]
    }
}

pub fn execute(format: OutputFormat) {
    let items: Vec<ScenarioInfo> = Scenario::ALL.into_iter().map(ScenarioInfo::from).collect();
    print_list(&items, format);
}
