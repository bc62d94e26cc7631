// SPDX-License-Identifier: Apache-2.0

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::{
    BatchEntry, DevConfError, DeviceSession, ErrorKind, FeatureModel,
    OptionsBlock, Statement, StatementBatch,
};

pub(crate) const INTERFACE_MODEL: &str = r#"---
name: interface
base-path: interfaces
identity: name
fields:
  - name: name
    type: string
  - name: description
    type: string
  - name: mtu
    type: int
    default: -1
  - name: disable
    type: flag
  - name: vlan_tagging
    type: flag
    keyword: vlan-tagging
  - name: unit
    type: blocks
    identity: number
    fields:
      - name: number
        type: int
      - name: description
        type: string
      - name: vlan_id
        type: int
        keyword: vlan-id
        default: -1
      - name: family_inet
        type: block
        keyword: family inet
        fields:
          - name: address
            type: blocks
            identity: cidr
            fields:
              - name: cidr
                type: string
              - name: preferred
                type: flag
"#;

pub(crate) const SSH_MODEL: &str = r#"---
name: ssh
base-path: system services ssh
fields:
  - name: port
    type: int
    default: -1
  - name: protocol_version
    type: set
    keyword: protocol-version
  - name: root_login
    type: string
    keyword: root-login
  - name: ciphers
    type: list
  - name: connection_limit
    type: int
    keyword: connection-limit
    default: -1
  - name: rate_limit
    type: int
    keyword: rate-limit
    default: -1
    requires:
      - connection_limit
  - name: no_tcp_forwarding
    type: flag
    keyword: no-tcp-forwarding
    exclusive-group: tcp-forwarding
  - name: tcp_forwarding
    type: flag
    keyword: tcp-forwarding
    exclusive-group: tcp-forwarding
"#;

pub(crate) fn interface_model() -> FeatureModel {
    FeatureModel::from_yaml(INTERFACE_MODEL).unwrap()
}

pub(crate) fn ssh_model() -> FeatureModel {
    FeatureModel::from_yaml(SSH_MODEL).unwrap()
}

pub(crate) fn load_tree(feature: &FeatureModel, yaml: &str) -> OptionsBlock {
    let value: serde_json::Value = serde_yaml::from_str(yaml).unwrap();
    OptionsBlock::from_json(&value, &feature.fields).unwrap()
}

pub(crate) fn parse_statements(lines: &[&str]) -> Vec<Statement> {
    lines.iter().map(|l| Statement::parse(l).unwrap()).collect()
}

const SHOW_PREFIX: &str = "show configuration ";
const SHOW_SUFFIX: &str = " | display set relative";

/// In-memory device: a committed and a candidate configuration of
/// absolute statements, with failure injection.
#[derive(Debug, Default)]
pub(crate) struct MockState {
    pub(crate) committed: Vec<Statement>,
    pub(crate) candidate: Vec<Statement>,
    pub(crate) calls: Vec<&'static str>,
    pub(crate) sent: Vec<StatementBatch>,
    pub(crate) commit_descriptions: Vec<String>,
    pub(crate) commit_warnings: Vec<String>,
    pub(crate) fail_lock: bool,
    pub(crate) fail_set: bool,
    pub(crate) fail_commit: bool,
    pub(crate) fail_clear: bool,
    // Commit reports success without storing anything
    pub(crate) drop_on_commit: bool,
    // Flag raised while statements are being sent
    pub(crate) cancel_on_set: Option<Arc<AtomicBool>>,
}

#[derive(Debug, Default)]
pub(crate) struct MockSession {
    state: Mutex<MockState>,
}

impl MockSession {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Device already holding these `set ...` lines.
    pub(crate) fn with_config(lines: &[&str]) -> Self {
        let ret = Self::new();
        {
            let mut state = ret.state();
            for line in lines.iter().copied() {
                let line = line.strip_prefix("set ").unwrap_or(line);
                state.committed.push(Statement::parse(line).unwrap());
            }
            state.candidate = state.committed.clone();
        }
        ret
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub(crate) fn count(&self, call: &str) -> usize {
        self.state().calls.iter().filter(|c| **c == call).count()
    }

    pub(crate) fn committed_lines(&self) -> Vec<String> {
        self.state()
            .committed
            .iter()
            .map(|s| format!("set {s}"))
            .collect()
    }
}

fn injected(what: &str) -> DevConfError {
    DevConfError::new(
        ErrorKind::TransportFailure,
        format!("injected {what} failure"),
    )
}

impl DeviceSession for MockSession {
    fn command(&self, cmd: &str) -> Result<String, DevConfError> {
        let mut state = self.state();
        state.calls.push("command");
        let path = cmd
            .strip_prefix(SHOW_PREFIX)
            .and_then(|c| c.strip_suffix(SHOW_SUFFIX))
            .ok_or_else(|| injected("unexpected command"))?;
        let path = Statement::parse(path)?;
        let mut ret = String::from("\n<configuration-output>\n");
        for statement in state.committed.iter() {
            if statement == &path {
                ret += "set\n";
            } else if statement.starts_with(path.tokens()) {
                let rest =
                    Statement::new(statement.tokens()[path.len()..].to_vec());
                ret += &format!("set {rest}\n");
            }
        }
        ret += "</configuration-output>\n";
        Ok(ret)
    }

    fn config_set(&self, batch: &StatementBatch) -> Result<(), DevConfError> {
        let mut state = self.state();
        state.calls.push("set");
        state.sent.push(batch.clone());
        if let Some(flag) = state.cancel_on_set.as_ref() {
            flag.store(true, Ordering::SeqCst);
        }
        if state.fail_set {
            return Err(injected("set"));
        }
        for entry in batch.entries() {
            match entry {
                BatchEntry::Delete(path) => state
                    .candidate
                    .retain(|s| !s.starts_with(path.tokens())),
                BatchEntry::Set(statement) => {
                    if !state.candidate.contains(statement) {
                        state.candidate.push(statement.clone());
                    }
                }
            }
        }
        Ok(())
    }

    fn config_lock(&self) -> Result<(), DevConfError> {
        let mut state = self.state();
        state.calls.push("lock");
        if state.fail_lock {
            Err(injected("lock"))
        } else {
            Ok(())
        }
    }

    fn config_clear(&self) -> Result<(), DevConfError> {
        let mut state = self.state();
        state.calls.push("clear");
        state.candidate = state.committed.clone();
        if state.fail_clear {
            Err(injected("clear"))
        } else {
            Ok(())
        }
    }

    fn commit_conf(
        &self,
        description: &str,
    ) -> Result<Vec<String>, DevConfError> {
        let mut state = self.state();
        state.calls.push("commit");
        state.commit_descriptions.push(description.to_string());
        if state.fail_commit {
            return Err(injected("commit"));
        }
        if state.drop_on_commit {
            state.candidate = state.committed.clone();
        } else {
            state.committed = state.candidate.clone();
        }
        Ok(state.commit_warnings.clone())
    }
}
