// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Background texture uploads.

[TextureTransferHelper] owns a worker thread that runs [GpuTexture::start_transfer] for queued
textures.  Finished textures wait in a completed list until the render thread picks them up
with [TextureTransferHelper::take_completed] and runs the render-thread half of the transfer.
*/

use crate::sys::lock;
use crate::texture::GpuTexture;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle, ThreadId};

#[derive(Debug, Default)]
struct Shared {
    completed: Mutex<Vec<Arc<GpuTexture>>>,
    shutdown: AtomicBool,
}

#[derive(Debug)]
pub struct TextureTransferHelper {
    sender: Option<Sender<Arc<GpuTexture>>>,
    worker: Option<JoinHandle<()>>,
    worker_id: ThreadId,
    shared: Arc<Shared>,
}

fn run_worker(receiver: Receiver<Arc<GpuTexture>>, shared: Arc<Shared>) {
    //ends when the helper drops its sender
    while let Ok(texture) = receiver.recv() {
        if shared.shutdown.load(Ordering::Relaxed) {
            texture.abandon_transfer();
            continue;
        }
        let _interval = logwise::profile_begin!("texture start_transfer");
        match texture.start_transfer() {
            Ok(()) => {
                //hold the list so a woken waiter finds the texture in it
                let mut completed = lock(&shared.completed);
                texture.mark_transferred();
                completed.push(texture);
            }
            Err(err) => {
                logwise::error_sync!(
                    "Transfer of texture {handle} failed: {err}",
                    handle = texture.handle().raw(),
                    err = logwise::privacy::LogIt(&err)
                );
                texture.abandon_transfer();
            }
        }
    }
}

impl TextureTransferHelper {
    pub fn new(thread_name: &str) -> Self {
        let shared = Arc::new(Shared::default());
        let (sender, receiver) = mpsc::channel();
        let worker_shared = shared.clone();
        let worker = thread::Builder::new()
            .name(thread_name.to_string())
            .spawn(move || run_worker(receiver, worker_shared))
            .expect("Failed to spawn texture transfer thread");
        TextureTransferHelper {
            sender: Some(sender),
            worker_id: worker.thread().id(),
            worker: Some(worker),
            shared,
        }
    }

    /**
    Queues `texture` for upload on the worker.

    A texture that is already in flight is not queued twice.  The returned future resolves once
    the background stage is over; the texture is not ready until the render thread also runs
    [TextureTransferHelper::take_completed] processing.  Dropping the future does not cancel
    the transfer.
    */
    pub fn transfer_texture(
        &self,
        texture: Arc<GpuTexture>,
    ) -> impl Future<Output = ()> + use<> {
        if texture.begin_transfer() {
            logwise::trace_sync!(
                "Queueing transfer of texture {handle}",
                handle = texture.handle().raw()
            );
            let sent = match &self.sender {
                Some(sender) => sender.send(texture.clone()).is_ok(),
                None => false,
            };
            if !sent {
                logwise::warn_sync!(
                    "Transfer worker is gone; texture {handle} stays outdated",
                    handle = texture.handle().raw()
                );
                texture.abandon_transfer();
            }
        }
        async move { texture.transferred().await }
    }

    /// Textures whose background stage finished since the last call.
    pub fn take_completed(&self) -> Vec<Arc<GpuTexture>> {
        std::mem::take(&mut *lock(&self.shared.completed))
    }

    pub fn is_worker_thread(&self) -> bool {
        thread::current().id() == self.worker_id
    }
}

impl Drop for TextureTransferHelper {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::Relaxed);
        //closing the channel ends the worker loop
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if !self.is_worker_thread() {
                let _ = worker.join();
            }
        }
    }
}
