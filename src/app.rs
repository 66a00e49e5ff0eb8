use crate::ui;
use alloy::primitives::{
    Address,
    TxHash,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use lottery_client::{
    RpcController,
    RpcWallet,
    controller::{
        ClientError,
        ControllerView,
        ErrorKind,
        LotterySnapshot,
    },
    deployment::Network,
    wallets::{
        self,
        WalletDescriptor,
    },
};
use std::{
    path::PathBuf,
    sync::Arc,
    time::Duration,
};
use tokio::{
    sync::mpsc,
    time,
};
use tracing::{
    error,
    info,
    warn,
};
use url::Url;

const ANIMATION_TICK: Duration = Duration::from_millis(120);
const MAX_ERRORS: usize = 50;

pub struct AppConfig {
    pub network: Network,
    pub endpoint: Url,
    pub lottery: Address,
    pub wallet_dir: PathBuf,
    pub refresh_interval: Duration,
    pub confirmation_poll: Duration,
}

#[derive(Clone, Debug)]
pub struct AppSnapshot {
    pub view: ControllerView,
    pub network: Network,
    pub lottery: Address,
    pub endpoint: String,
    pub errors: Vec<String>,
}

/// Completion of work spawned off the UI loop.
enum TaskEvent {
    Fetched(Result<LotterySnapshot, ClientError>),
    Entered(Result<TxHash, ClientError>),
    Claimed(Result<TxHash, ClientError>),
    Unlocked {
        wallet: String,
        result: Result<RpcWallet>,
    },
}

struct App {
    controller: Arc<RpcController>,
    config: AppConfig,
    errors: Vec<String>,
    task_tx: mpsc::UnboundedSender<TaskEvent>,
}

impl App {
    fn snapshot(&self) -> AppSnapshot {
        AppSnapshot {
            view: self.controller.view(),
            network: self.config.network,
            lottery: self.config.lottery,
            endpoint: redact_endpoint(&self.config.endpoint),
            errors: self.errors.clone(),
        }
    }

    fn push_error(&mut self, item: impl Into<String>) {
        let item = item.into();
        error!("{}", item);
        self.errors.push(item);
        if self.errors.len() > MAX_ERRORS {
            let drain = self.errors.len() - MAX_ERRORS;
            self.errors.drain(0..drain);
        }
    }

    fn spawn_fetch(&self) {
        let controller = self.controller.clone();
        let tx = self.task_tx.clone();
        tokio::spawn(async move {
            let result = controller.fetch_state().await;
            let _ = tx.send(TaskEvent::Fetched(result));
        });
    }

    fn spawn_enter(&self, amount: String) {
        let controller = self.controller.clone();
        let tx = self.task_tx.clone();
        tokio::spawn(async move {
            let result = controller.enter(&amount).await;
            let _ = tx.send(TaskEvent::Entered(result));
        });
    }

    fn spawn_claim(&self) {
        let controller = self.controller.clone();
        let tx = self.task_tx.clone();
        tokio::spawn(async move {
            let result = controller.claim().await;
            let _ = tx.send(TaskEvent::Claimed(result));
        });
    }

    fn spawn_unlock(&self, wallet: WalletDescriptor, password: String) {
        let tx = self.task_tx.clone();
        let endpoint = self.config.endpoint.clone();
        let lottery = self.config.lottery;
        let poll = self.config.confirmation_poll;
        tokio::spawn(async move {
            let name = wallet.name.clone();
            let result = tokio::task::spawn_blocking(move || {
                wallets::unlock_wallet(&wallet, &password)
            })
            .await
            .map_err(|e| eyre!("wallet unlock task failed: {e}"))
            .and_then(|unlocked| unlocked)
            .map(|signer| RpcWallet::connect(endpoint, lottery, signer, poll));
            let _ = tx.send(TaskEvent::Unlocked {
                wallet: name,
                result,
            });
        });
    }

    fn load_wallets(&mut self) -> Vec<WalletDescriptor> {
        match wallets::list_wallets(&self.config.wallet_dir) {
            Ok(found) => found,
            Err(e) => {
                self.push_error(format!("Failed to list wallets: {e}"));
                Vec::new()
            }
        }
    }

    fn handle_task(&mut self, event: TaskEvent) {
        match event {
            TaskEvent::Fetched(result) => log_outcome("refresh", result),
            TaskEvent::Entered(result) => self.report_action("enter", result),
            TaskEvent::Claimed(result) => self.report_action("claim", result),
            TaskEvent::Unlocked { wallet, result } => match result {
                Ok(session) => match self.controller.connect(session) {
                    Ok(address) => {
                        info!(%wallet, %address, "wallet session started");
                        self.errors.clear();
                        self.spawn_fetch();
                    }
                    Err(e) => self.push_error(format!("Could not connect '{wallet}': {e}")),
                },
                Err(e) => {
                    let err = self.controller.connect_failed(format!("{e:#}"));
                    warn!(%wallet, "{err}");
                    self.push_error(format!("{err}"));
                }
            },
        }
    }

    fn report_action(&mut self, operation: &str, result: Result<TxHash, ClientError>) {
        if matches!(&result, Err(e) if e.kind() == ErrorKind::Busy) {
            self.push_error(format!("Another action is in progress, {operation} was not sent"));
        }
        log_outcome(operation, result);
    }

    fn handle_user_event(&mut self, ui_state: &mut ui::UiState, event: ui::UserEvent) {
        match event {
            ui::UserEvent::Quit | ui::UserEvent::Redraw | ui::UserEvent::OpenEntry => {}
            ui::UserEvent::Refresh => {
                self.errors.clear();
                self.spawn_fetch();
            }
            ui::UserEvent::OpenWalletPicker => {
                let found = self.load_wallets();
                if found.is_empty() {
                    self.push_error(format!(
                        "No keystores in {}",
                        self.config.wallet_dir.display()
                    ));
                }
                ui_state.set_wallets(found);
            }
            ui::UserEvent::UnlockWallet { wallet, password } => {
                if self.controller.begin_connect().is_err() {
                    self.push_error("Wait for the current action to finish before switching wallets");
                    return;
                }
                info!(wallet = %wallet.name, "unlocking wallet");
                self.spawn_unlock(wallet, password);
            }
            ui::UserEvent::Disconnect => {
                if let Err(e) = self.controller.disconnect() {
                    warn!("disconnect ignored: {e}");
                }
            }
            ui::UserEvent::SubmitEntry(amount) => {
                self.errors.clear();
                self.spawn_enter(amount);
            }
            ui::UserEvent::Claim => {
                self.errors.clear();
                self.spawn_claim();
            }
        }
    }
}

fn log_outcome<T: std::fmt::Debug>(operation: &str, result: Result<T, ClientError>) {
    match result {
        Ok(value) => info!(operation, ?value, "completed"),
        Err(e) if e.kind() == ErrorKind::Busy => {
            info!(operation, "skipped while another operation is in flight")
        }
        Err(e) => warn!(operation, kind = ?e.kind(), "failed: {e}"),
    }
}

/// Infura URLs carry the project key in the path.
fn redact_endpoint(endpoint: &Url) -> String {
    match endpoint.host_str() {
        Some(host) if host.ends_with("infura.io") => format!("{}://{host}", endpoint.scheme()),
        _ => endpoint.to_string(),
    }
}

pub async fn run_app(controller: Arc<RpcController>, config: AppConfig) -> Result<()> {
    let mut ui_state = ui::UiState::default();
    let mut input_events = ui::input_event_stream();

    tracing::info!("Starting UI");
    ui::terminal_enter(&mut ui_state)?;
    tracing::info!("UI ready");
    let res = run_loop(controller, config, &mut ui_state, &mut input_events).await;
    ui::terminal_exit()?;
    res
}

async fn run_loop(
    controller: Arc<RpcController>,
    config: AppConfig,
    ui_state: &mut ui::UiState,
    input_events: &mut ui::InputEventReceiver,
) -> Result<()> {
    tracing::info!("Running app loop");
    let (task_tx, mut task_rx) = mpsc::unbounded_channel();
    let mut refresh = time::interval(config.refresh_interval);
    let mut animation = time::interval(ANIMATION_TICK);
    animation.set_missed_tick_behavior(time::MissedTickBehavior::Skip);
    let mut app = App {
        controller,
        config,
        errors: Vec::new(),
        task_tx,
    };

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = refresh.tick() => {
                // the first tick fires immediately and performs the initial load
                app.spawn_fetch();
            }
            _ = animation.tick() => {
                ui_state.tick(ANIMATION_TICK);
            }
            Some(event) = task_rx.recv() => {
                app.handle_task(event);
            }
            raw_ev = ui::next_raw_event(input_events) => {
                let event = raw_ev.wrap_err("reading terminal input failed")?;
                let view = app.controller.view();
                let Some(ev) = ui::interpret_event(ui_state, &view, event) else {
                    continue;
                };
                if matches!(ev, ui::UserEvent::Quit) {
                    break;
                }
                app.handle_user_event(ui_state, ev);
            }
        }
        ui::draw(ui_state, &app.snapshot()).wrap_err("draw failed")?;
    }
    tracing::info!("Leaving app loop");
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    #[test]
    fn redact_endpoint__hides_infura_key() {
        let infura = Url::parse("https://sepolia.infura.io/v3/secret").unwrap();
        let local = Url::parse("http://localhost:8545").unwrap();

        assert_eq!("https://sepolia.infura.io", redact_endpoint(&infura));
        assert_eq!("http://localhost:8545/", redact_endpoint(&local));
    }
}
