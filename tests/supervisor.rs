use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use devloop::broadcast::Broadcast;
use devloop::supervisor::{
    ExitIntent, OperatorPrompt, ServerHandle, ServerSpawner, Signal, Supervisor,
};
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;

#[derive(Default)]
struct Calls {
    spawns: usize,
    kills: usize,
    prompts: usize,
}

type SharedCalls = Arc<Mutex<Calls>>;

/// Scripted stand-in for a server process.
struct FakeServer {
    code: Option<i32>,
    until_killed: bool,
    killed_tx: watch::Sender<bool>,
    killed_rx: watch::Receiver<bool>,
    calls: SharedCalls,
}

impl FakeServer {
    fn new(code: Option<i32>, until_killed: bool, calls: &SharedCalls) -> Self {
        let (killed_tx, killed_rx) = watch::channel(false);
        Self {
            code,
            until_killed,
            killed_tx,
            killed_rx,
            calls: calls.clone(),
        }
    }

    /// Exits on its own with the given code.
    fn exits(code: i32, calls: &SharedCalls) -> Self {
        Self::new(Some(code), false, calls)
    }

    /// Runs until killed, then reports a signal-death (no exit code).
    fn runs_until_killed(calls: &SharedCalls) -> Self {
        Self::new(None, true, calls)
    }
}

impl ServerHandle for FakeServer {
    fn wait(&mut self) -> impl Future<Output = Result<Option<i32>>> + Send {
        let mut killed_rx = self.killed_rx.clone();
        let until_killed = self.until_killed;
        let code = self.code;
        async move {
            if until_killed {
                killed_rx
                    .wait_for(|killed| *killed)
                    .await
                    .map_err(|e| anyhow!("kill channel closed: {e}"))?;
            }
            Ok(code)
        }
    }

    fn kill(&mut self) {
        self.calls.lock().unwrap().kills += 1;
        let _ = self.killed_tx.send(true);
    }
}

struct ScriptedSpawner {
    script: VecDeque<FakeServer>,
    fail: bool,
    calls: SharedCalls,
}

impl ScriptedSpawner {
    fn new(script: Vec<FakeServer>, calls: &SharedCalls) -> Self {
        Self {
            script: script.into(),
            fail: false,
            calls: calls.clone(),
        }
    }

    fn failing(calls: &SharedCalls) -> Self {
        Self {
            script: VecDeque::new(),
            fail: true,
            calls: calls.clone(),
        }
    }
}

impl ServerSpawner for ScriptedSpawner {
    type Handle = FakeServer;

    fn spawn(&mut self) -> Result<FakeServer> {
        self.calls.lock().unwrap().spawns += 1;
        if self.fail {
            return Err(anyhow!("spawn refused"));
        }
        self.script
            .pop_front()
            .ok_or_else(|| anyhow!("spawn script exhausted"))
    }
}

struct ScriptedPrompt {
    answers: VecDeque<bool>,
    calls: SharedCalls,
}

impl ScriptedPrompt {
    fn new(answers: Vec<bool>, calls: &SharedCalls) -> Self {
        Self {
            answers: answers.into(),
            calls: calls.clone(),
        }
    }
}

impl OperatorPrompt for ScriptedPrompt {
    fn confirm_restart(&mut self) -> impl Future<Output = Result<bool>> + Send {
        self.calls.lock().unwrap().prompts += 1;
        let answer = self.answers.pop_front().unwrap_or(false);
        async move { Ok(answer) }
    }
}

/// Prompt that blocks until the test sends it an answer, so the supervisor
/// can be observed mid-prompt.
struct GatedPrompt {
    answers: mpsc::UnboundedReceiver<bool>,
    calls: SharedCalls,
}

impl OperatorPrompt for GatedPrompt {
    fn confirm_restart(&mut self) -> impl Future<Output = Result<bool>> + Send {
        self.calls.lock().unwrap().prompts += 1;
        async move { Ok(self.answers.recv().await.unwrap_or(false)) }
    }
}

fn supervisor(
    script: Vec<FakeServer>,
    answers: Vec<bool>,
    calls: &SharedCalls,
) -> (Supervisor<ScriptedSpawner, ScriptedPrompt>, Broadcast<Signal>) {
    let signals: Broadcast<Signal> = Broadcast::new();
    let sup = Supervisor::new(
        ScriptedSpawner::new(script, calls),
        ScriptedPrompt::new(answers, calls),
        signals.clone(),
    );
    (sup, signals)
}

#[tokio::test]
async fn exit_code_one_respawns_without_prompting() {
    let calls = SharedCalls::default();
    let (sup, _signals) = supervisor(
        vec![
            FakeServer::exits(1, &calls),
            FakeServer::exits(2, &calls),
        ],
        vec![],
        &calls,
    );

    sup.run().await.unwrap();

    let calls = calls.lock().unwrap();
    assert_eq!(calls.spawns, 2);
    assert_eq!(calls.prompts, 0);
    assert_eq!(calls.kills, 0);
}

#[tokio::test]
async fn exit_code_two_shuts_down_without_respawn() {
    let calls = SharedCalls::default();
    let (sup, _signals) = supervisor(vec![FakeServer::exits(2, &calls)], vec![], &calls);

    sup.run().await.unwrap();

    let calls = calls.lock().unwrap();
    assert_eq!(calls.spawns, 1);
    assert_eq!(calls.prompts, 0);
    assert_eq!(calls.kills, 0);
}

#[tokio::test]
async fn unexpected_exit_prompts_and_y_respawns() {
    let calls = SharedCalls::default();
    let (sup, _signals) = supervisor(
        vec![
            FakeServer::exits(0, &calls),
            FakeServer::exits(2, &calls),
        ],
        vec![true],
        &calls,
    );

    sup.run().await.unwrap();

    let calls = calls.lock().unwrap();
    assert_eq!(calls.spawns, 2);
    assert_eq!(calls.prompts, 1);
}

#[tokio::test]
async fn unexpected_exit_prompt_declined_terminates() {
    let calls = SharedCalls::default();
    let (sup, _signals) = supervisor(vec![FakeServer::exits(3, &calls)], vec![false], &calls);

    sup.run().await.unwrap();

    let calls = calls.lock().unwrap();
    assert_eq!(calls.spawns, 1);
    assert_eq!(calls.prompts, 1);
}

#[tokio::test]
async fn spawn_failure_propagates() {
    let calls = SharedCalls::default();
    let signals: Broadcast<Signal> = Broadcast::new();
    let sup = Supervisor::new(
        ScriptedSpawner::failing(&calls),
        ScriptedPrompt::new(vec![], &calls),
        signals,
    );

    assert!(sup.run().await.is_err());
    assert_eq!(calls.lock().unwrap().spawns, 1);
}

#[tokio::test(start_paused = true)]
async fn restart_signal_kills_once_and_respawns_once() {
    let calls = SharedCalls::default();
    let (sup, signals) = supervisor(
        vec![
            FakeServer::runs_until_killed(&calls),
            FakeServer::exits(2, &calls),
        ],
        vec![],
        &calls,
    );

    let run = tokio::spawn(sup.run());

    // With the clock paused, the sleep only completes once the supervisor is
    // blocked waiting, so the restart waiter is registered by now.
    sleep(Duration::from_millis(10)).await;
    signals.send(&Signal::Restart);

    run.await.unwrap().unwrap();

    let calls = calls.lock().unwrap();
    assert_eq!(calls.kills, 1, "exactly one kill on the running server");
    assert_eq!(calls.spawns, 2, "one respawn after the observed exit");
    assert_eq!(calls.prompts, 0, "a requested restart never prompts");
}

#[tokio::test(start_paused = true)]
async fn shutdown_signal_stops_the_server_and_terminates() {
    let calls = SharedCalls::default();
    let (sup, signals) = supervisor(vec![FakeServer::runs_until_killed(&calls)], vec![], &calls);

    let run = tokio::spawn(sup.run());

    sleep(Duration::from_millis(10)).await;
    signals.send(&Signal::Shutdown);

    run.await.unwrap().unwrap();

    let calls = calls.lock().unwrap();
    assert_eq!(calls.kills, 1);
    assert_eq!(calls.spawns, 1);
    assert_eq!(calls.prompts, 0);
}

#[tokio::test(start_paused = true)]
async fn restart_signal_during_the_prompt_is_dropped() {
    let calls = SharedCalls::default();
    let (answer_tx, answer_rx) = mpsc::unbounded_channel();
    let signals: Broadcast<Signal> = Broadcast::new();
    let sup = Supervisor::new(
        ScriptedSpawner::new(
            vec![
                FakeServer::exits(0, &calls),
                FakeServer::exits(2, &calls),
            ],
            &calls,
        ),
        GatedPrompt {
            answers: answer_rx,
            calls: calls.clone(),
        },
        signals.clone(),
    );

    let run = tokio::spawn(sup.run());

    // Paused clock: the sleep completes once the supervisor is blocked, which
    // here means it is waiting on the prompt after the unexpected exit.
    sleep(Duration::from_millis(10)).await;
    assert_eq!(calls.lock().unwrap().prompts, 1);

    // With the prompt outstanding no restart waiter is registered, so this
    // signal must vanish instead of queuing a second spawn or a kill.
    assert_eq!(signals.subscriber_count(), 0);
    signals.send(&Signal::Restart);

    answer_tx.send(true).unwrap();
    run.await.unwrap().unwrap();

    let calls = calls.lock().unwrap();
    assert_eq!(calls.spawns, 2, "only the prompt answer causes the respawn");
    assert_eq!(calls.kills, 0, "the dropped signal never kills anything");
    assert_eq!(calls.prompts, 1);
}

#[test]
fn exit_intent_decodes_the_code_contract() {
    assert_eq!(ExitIntent::from_code(Some(1)), ExitIntent::Restart);
    assert_eq!(ExitIntent::from_code(Some(2)), ExitIntent::Shutdown);
    assert_eq!(ExitIntent::from_code(Some(0)), ExitIntent::Unknown(Some(0)));
    assert_eq!(ExitIntent::from_code(Some(5)), ExitIntent::Unknown(Some(5)));
    assert_eq!(ExitIntent::from_code(None), ExitIntent::Unknown(None));
}
