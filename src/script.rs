use serde::{Deserialize, Serialize};
use tracing::info;

use crate::address::Address;
use crate::auth::SignedCall;
use crate::battle::{BattleEvent, WinnerPolicy};
use crate::config::{ConfigError, LedgerConfig};
use crate::ledger::{Amount, LedgerEvent, LedgerSnapshot};
use crate::runtime::{Call, Receipt, Runtime};

/// A replayable deployment plus transaction list.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Script {
    pub admin: Address,
    pub resolver: Address,
    #[serde(default)]
    pub policy: WinnerPolicy,
    #[serde(default)]
    pub genesis: Vec<GenesisBalance>,
    pub transactions: Vec<ScriptTx>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenesisBalance {
    pub account: Address,
    pub amount: Amount,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptTx {
    Signed(SignedCall),
    Plain { caller: Address, call: Call },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StepResult {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<Receipt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScriptReport {
    pub steps: Vec<StepResult>,
    pub snapshot: LedgerSnapshot,
    pub ledger_events: Vec<LedgerEvent>,
    pub battle_events: Vec<BattleEvent>,
}

impl Script {
    /// Deploys a fresh runtime and applies every transaction in order.
    ///
    /// Rejected transactions are reported and skipped.
    pub fn run(&self, config: &LedgerConfig, seed: Option<u64>) -> Result<ScriptReport, ConfigError> {
        let runtime = Runtime::deploy(config, self.admin, self.resolver, self.policy, seed)?;
        for entry in &self.genesis {
            runtime
                .fund(entry.account, entry.amount)
                .map_err(|_| ConfigError::Invalid("genesis balance overflows"))?;
        }

        let mut steps = Vec::with_capacity(self.transactions.len());
        for (index, tx) in self.transactions.iter().enumerate() {
            let result = match tx {
                ScriptTx::Signed(signed) => runtime.submit(signed).map_err(|err| err.to_string()),
                ScriptTx::Plain { caller, call } => runtime
                    .execute(*caller, call.clone())
                    .map_err(|err| err.to_string()),
            };
            steps.push(match result {
                Ok(receipt) => StepResult {
                    index,
                    receipt: Some(receipt),
                    error: None,
                },
                Err(error) => StepResult {
                    index,
                    receipt: None,
                    error: Some(error),
                },
            });
        }

        let report = ScriptReport {
            steps,
            snapshot: runtime.snapshot(),
            ledger_events: runtime.ledger_events(),
            battle_events: runtime.battle_events(),
        };
        info!(
            transactions = report.steps.len(),
            rejected = report.steps.iter().filter(|s| s.error.is_some()).count(),
            total_supply = report.snapshot.total_supply,
            "script finished"
        );
        Ok(report)
    }
}
