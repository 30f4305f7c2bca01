//! Headphone jack detect worker
//!
//! Watches the jack switch stream. Insertion passes the detect-in item
//! and gates the audio checks on; removal passes detect-out and gates
//! them off. Both items are terminal once passed and never re-arm.

use crate::item::CheckId;
use crate::scoreboard::Scoreboard;
use crate::state::RunState;
use jig_hal::{InputEvent, InputStream, SW_HEADPHONE_INSERT};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Jack detect worker task
pub async fn run_jack_worker(
    stream: Arc<dyn InputStream>,
    board: Scoreboard,
    state: Arc<RunState>,
    shutdown: CancellationToken,
) {
    board.arm(CheckId::JackIn);
    board.arm(CheckId::JackOut);

    loop {
        tokio::select! {
            () = shutdown.cancelled() => return,
            event = stream.next() => match event {
                Ok(Some(InputEvent::Switch { code: SW_HEADPHONE_INSERT, engaged })) => {
                    state.set_jack(engaged);
                    let id = if engaged { CheckId::JackIn } else { CheckId::JackOut };
                    if !board.passed(id) {
                        board.pass(id, "PASS");
                    }
                }
                Ok(_) => {}
                Err(error) => {
                    tracing::warn!(%error, "jack stream error");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{Registry, Status};
    use jig_hal::sim::{SimInput, SimPanel};
    use std::time::Duration;

    fn switch(engaged: bool) -> InputEvent {
        InputEvent::Switch {
            code: SW_HEADPHONE_INSERT,
            engaged,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn insert_then_remove_passes_both() {
        let stream = Arc::new(SimInput::scripted(vec![
            (Duration::from_millis(10), switch(true)),
            (Duration::from_millis(50), switch(false)),
        ]));
        let board = Scoreboard::new(Arc::new(Registry::new()), Arc::new(SimPanel::new()));
        let state = Arc::new(RunState::new(60));
        let shutdown = CancellationToken::new();

        let worker = tokio::spawn(run_jack_worker(
            stream,
            board.clone(),
            state.clone(),
            shutdown.clone(),
        ));
        tokio::time::sleep(Duration::from_millis(300)).await;
        shutdown.cancel();
        worker.await.unwrap();

        assert!(board.passed(CheckId::JackIn));
        assert!(board.passed(CheckId::JackOut));
        assert!(!state.jack_inserted());
    }

    #[tokio::test(start_paused = true)]
    async fn insertion_gates_audio_on() {
        let stream = Arc::new(SimInput::scripted(vec![(
            Duration::from_millis(10),
            switch(true),
        )]));
        let board = Scoreboard::new(Arc::new(Registry::new()), Arc::new(SimPanel::new()));
        let state = Arc::new(RunState::new(60));
        let shutdown = CancellationToken::new();

        let worker = tokio::spawn(run_jack_worker(
            stream,
            board.clone(),
            state.clone(),
            shutdown.clone(),
        ));
        tokio::time::sleep(Duration::from_millis(200)).await;
        shutdown.cancel();
        worker.await.unwrap();

        assert!(state.jack_inserted());
        assert!(board.passed(CheckId::JackIn));
        assert_eq!(board.registry().status(CheckId::JackOut), Status::Run);
    }
}
