use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, bail};

use cronfleet_model::Task;

/// Reads a JSON array of tasks. Ids must be unique.
pub fn load(path: &Path) -> anyhow::Result<Vec<Task>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading task file {}", path.display()))?;
    parse(&raw).with_context(|| format!("parsing task file {}", path.display()))
}

pub fn parse(raw: &str) -> anyhow::Result<Vec<Task>> {
    let tasks: Vec<Task> = serde_json::from_str(raw)?;

    let mut seen = HashSet::new();
    for task in &tasks {
        if !seen.insert(task.id) {
            bail!("duplicate task id {}", task.id);
        }
    }
    Ok(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cronfleet_model::Protocol;

    #[test]
    fn parses_minimal_tasks() {
        let tasks = parse(
            r#"[
                {"id": 1, "name": "ping", "spec": "0 */5 * * * *", "protocol": "http",
                 "command": "http://localhost:8080/ping"},
                {"id": 2, "name": "backup", "spec": "0 0 2 * * *", "protocol": "remoteExec",
                 "command": "tar czf /tmp/b.tgz /etc", "multi": false,
                 "hosts": [{"id": 1, "name": "db1", "alias": "db", "port": 5921}]}
            ]"#,
        )
        .unwrap();

        assert_eq!(tasks.len(), 2);
        assert!(tasks[0].enabled);
        assert_eq!(tasks[1].protocol, Protocol::RemoteExec);
        assert!(tasks[1].is_single_instance());
        assert_eq!(tasks[1].hosts[0].addr(), "db1:5921");
    }

    #[test]
    fn duplicate_ids_rejected() {
        let err = parse(
            r#"[{"id": 1, "name": "a", "protocol": "http", "command": "x"},
                {"id": 1, "name": "b", "protocol": "http", "command": "y"}]"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate task id 1"));
    }

    #[test]
    fn missing_file_names_path() {
        let err = load(Path::new("/nonexistent/tasks.json")).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/tasks.json"));
    }
}
