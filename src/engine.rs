// src/engine.rs
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SendError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use log::{debug, error, info, warn};
use crate::echogram::{CancelToken, EchogramError, EchogramPipeline, EchogramView, PipelineState};
use crate::types::*;
/// Front-end side of the render worker.
///
/// Every render-triggering command bumps the shared generation before it is queued,
/// so a render already running on the worker notices it is stale and stops.
/// Commands carry the generation they were sent under.
pub struct EngineHandle {
    tx: Sender<(u64, ViewCommand)>,
    generation: Arc<AtomicU64>,
    worker: Option<JoinHandle<()>>,
}
impl EngineHandle {
    pub fn send(&self, cmd: ViewCommand) -> Result<(), SendError<(u64, ViewCommand)>> {
        let generation = if cmd.triggers_render() {
            self.generation.fetch_add(1, Ordering::AcqRel) + 1
        } else {
            self.generation.load(Ordering::Acquire)
        };
        self.tx.send((generation, cmd))
    }
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
    pub fn shutdown(mut self) {
        self.stop();
    }
    fn stop(&mut self) {
        // cancel whatever is still running
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.tx.send((generation, ViewCommand::Shutdown)).ok();
        if let Some(worker) = self.worker.take() {
            worker.join().ok();
        }
    }
}
impl Drop for EngineHandle {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.stop();
        }
    }
}
pub fn spawn_thread(pipeline: EchogramPipeline, tx: Sender<ViewMessage>) -> EngineHandle {
    let (tx_cmd, rx_cmd) = mpsc::channel();
    let generation = Arc::new(AtomicU64::new(0));
    let latest = generation.clone();
    let worker = thread::spawn(move || run(pipeline, tx, rx_cmd, latest));
    EngineHandle {
        tx: tx_cmd,
        generation,
        worker: Some(worker),
    }
}
fn run(
    mut pipeline: EchogramPipeline,
    tx: Sender<ViewMessage>,
    rx_cmd: Receiver<(u64, ViewCommand)>,
    latest: Arc<AtomicU64>,
) {
    tx.send(ViewMessage::Log("echogram worker ready".to_owned())).ok();
    // A render command queued behind a newer one starts with a stale token; the
    // pipeline still records its request before bailing out.
    while let Ok((generation, cmd)) = rx_cmd.recv() {
        let token = CancelToken::new(generation, latest.clone());
        let commits = pipeline.commits();
        let outcome = match cmd {
            ViewCommand::Shutdown => break,
            ViewCommand::SelectionChanged(selection) => {
                match pipeline.change_selection(&selection) {
                    Ok(histogram) => {
                        tx.send(ViewMessage::HistogramReady(histogram.clone())).ok();
                        Ok(())
                    }
                    Err(e) => Err(e),
                }
            }
            ViewCommand::Hover { time, depth } => match pipeline.probe(time, depth) {
                Ok(probe) => {
                    tx.send(ViewMessage::Hovered(probe)).ok();
                    Ok(())
                }
                Err(e) => Err(e),
            },
            ViewCommand::SourceChanged(path) => {
                tx.send(ViewMessage::State(PipelineState::Aggregating)).ok();
                let result = pipeline.change_source(&path, &token);
                publish(&tx, &token, result)
            }
            ViewCommand::ChannelChanged(selector) => {
                tx.send(ViewMessage::State(PipelineState::Aggregating)).ok();
                let result = pipeline.change_channel(selector, &token);
                publish(&tx, &token, result)
            }
            ViewCommand::ColormapChanged(scale) => {
                tx.send(ViewMessage::State(PipelineState::Aggregating)).ok();
                let result = pipeline.change_colormap(scale, &token);
                publish(&tx, &token, result)
            }
        };
        // a rejected request may still have rendered an earlier superseded one
        let caught_up = outcome.is_err() && pipeline.commits() > commits;
        match outcome {
            Ok(()) => {}
            Err(EchogramError::Superseded) => debug!("request {} superseded", token.generation()),
            Err(EchogramError::EmptyDataset) => {
                tx.send(ViewMessage::NoData("selected channel has no data".to_owned()))
                    .ok();
            }
            Err(e) => {
                if e.is_recoverable() {
                    warn!("request rejected: {e}");
                } else {
                    error!("render failed: {e}");
                }
                tx.send(ViewMessage::Failed(e.to_string())).ok();
            }
        }
        if caught_up {
            if let Some(view) = pipeline.view() {
                tx.send(ViewMessage::Rendered(Box::new(RenderedView::from_view(
                    token.generation(),
                    view,
                ))))
                .ok();
            }
        }
        tx.send(ViewMessage::State(pipeline.state())).ok();
    }
    info!("echogram worker stopped");
}
fn publish(
    tx: &Sender<ViewMessage>,
    token: &CancelToken,
    result: Result<&EchogramView, EchogramError>,
) -> Result<(), EchogramError> {
    let view = result?;
    tx.send(ViewMessage::Rendered(Box::new(RenderedView::from_view(
        token.generation(),
        view,
    ))))
    .ok();
    Ok(())
}
