//! `ACTION: VERB | key=value | ...` lines emitted by a coordinator.

use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

static ACTION_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[ \t]*(?:[-*][ \t]*)?ACTION:[ \t]*(.+?)[ \t]*$").expect("valid action pattern")
});

/// One parsed instruction. Task and agent references are kept as written and
/// resolved when the action runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Assign {
        task: String,
        agent: String,
    },
    Create {
        title: String,
        description: Option<String>,
        tags: Vec<String>,
        priority: Option<String>,
    },
    Reassign {
        task: String,
        from: Option<String>,
        to: String,
    },
    Trigger {
        agent: String,
    },
    SetStatus {
        task: String,
        status: String,
    },
    /// Known verb with a required key missing
    Incomplete {
        verb: String,
        missing: &'static str,
    },
    Unknown {
        verb: String,
    },
}

impl Action {
    pub fn is_create(&self) -> bool {
        matches!(self, Action::Create { .. })
    }

    /// Task id as written, for verbs that name one
    pub fn task_ref(&self) -> Option<&str> {
        match self {
            Action::Assign { task, .. } | Action::Reassign { task, .. } | Action::SetStatus { task, .. } => {
                Some(task.as_str())
            }
            _ => None,
        }
    }

    pub fn verb(&self) -> &str {
        match self {
            Action::Assign { .. } => "ASSIGN",
            Action::Create { .. } => "CREATE",
            Action::Reassign { .. } => "REASSIGN",
            Action::Trigger { .. } => "TRIGGER",
            Action::SetStatus { .. } => "STATUS",
            Action::Incomplete { verb, .. } | Action::Unknown { verb } => verb,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Assign { task, agent } => write!(f, "ASSIGN task={task} agent={agent}"),
            Action::Create { title, .. } => write!(f, "CREATE title={title}"),
            Action::Reassign { task, from, to } => match from {
                Some(from) => write!(f, "REASSIGN task={task} from={from} to={to}"),
                None => write!(f, "REASSIGN task={task} to={to}"),
            },
            Action::Trigger { agent } => write!(f, "TRIGGER agent={agent}"),
            Action::SetStatus { task, status } => write!(f, "STATUS task={task} status={status}"),
            Action::Incomplete { verb, .. } | Action::Unknown { verb } => write!(f, "{verb}"),
        }
    }
}

struct Fields(HashMap<String, String>);

impl Fields {
    fn parse<'s>(segments: impl Iterator<Item = &'s str>) -> Self {
        let mut map = HashMap::new();
        for segment in segments {
            let Some((key, value)) = segment.split_once('=') else {
                continue;
            };
            let key = key.trim().to_ascii_lowercase().replace(['_', '-'], "");
            let value = value.trim().trim_matches(|c: char| c == '"' || c == '\'').trim();
            if !key.is_empty() && !value.is_empty() {
                map.entry(key).or_insert_with(|| value.to_string());
            }
        }
        Self(map)
    }

    /// First present key among `names`
    fn get(&self, names: &[&str]) -> Option<String> {
        names.iter().find_map(|n| self.0.get(*n).cloned())
    }
}

const TASK_KEYS: &[&str] = &["taskid", "task", "id"];
const AGENT_KEYS: &[&str] = &["agentid", "agentname", "agent"];

fn parse_line(body: &str) -> Option<Action> {
    let mut segments = body.split('|');
    let verb = segments.next()?.trim().to_ascii_uppercase();
    if verb.is_empty() {
        return None;
    }
    let fields = Fields::parse(segments);
    let incomplete = |missing| Action::Incomplete {
        verb: verb.clone(),
        missing,
    };

    let action = match verb.as_str() {
        "ASSIGN" => match (fields.get(TASK_KEYS), fields.get(AGENT_KEYS)) {
            (Some(task), Some(agent)) => Action::Assign { task, agent },
            (None, _) => incomplete("taskId"),
            (_, None) => incomplete("agentId|agentName"),
        },
        "CREATE" => match fields.get(&["title"]) {
            Some(title) => Action::Create {
                title,
                description: fields.get(&["description", "desc"]),
                tags: fields
                    .get(&["tags", "tag"])
                    .map(|t| {
                        t.split(',')
                            .map(|s| s.trim().to_string())
                            .filter(|s| !s.is_empty())
                            .collect()
                    })
                    .unwrap_or_default(),
                priority: fields.get(&["priority"]),
            },
            None => incomplete("title"),
        },
        "REASSIGN" => match (
            fields.get(TASK_KEYS),
            fields.get(&["toagent", "to", "toagentid", "toagentname"]),
        ) {
            (Some(task), Some(to)) => Action::Reassign {
                task,
                from: fields.get(&["fromagent", "from", "fromagentid", "fromagentname"]),
                to,
            },
            (None, _) => incomplete("taskId"),
            (_, None) => incomplete("toAgent"),
        },
        "TRIGGER" => match fields.get(AGENT_KEYS) {
            Some(agent) => Action::Trigger { agent },
            None => incomplete("agentId|agentName"),
        },
        "STATUS" => match (fields.get(TASK_KEYS), fields.get(&["status", "to"])) {
            (Some(task), Some(status)) => Action::SetStatus { task, status },
            (None, _) => incomplete("taskId"),
            (_, None) => incomplete("status"),
        },
        _ => Action::Unknown { verb: verb.clone() },
    };
    Some(action)
}

/// Every ACTION line of `text`, in document order. Lines with no verb are dropped.
pub fn parse_actions(text: &str) -> Vec<Action> {
    ACTION_LINE
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .filter_map(|m| parse_line(m.as_str()))
        .collect()
}
