//! `on_post_execute` 전달
//!
//! 워커는 결과 콜백을 [`ResultDispatcher`]에 넘깁니다. 기본값인 [`ImmediateDispatcher`]는
//! 워커 스레드에서 바로 실행하고, [`ChannelDispatcher`]는 소유 스레드가 `pump`할 때 실행합니다.

use parking_lot::Mutex;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;
use tracing::warn;

/// 결과 콜백
pub type PostExecute = Box<dyn FnOnce() + Send>;

pub trait ResultDispatcher: Send + Sync {
    fn dispatch(&self, callback: PostExecute);
}

/// 워커 스레드에서 즉시 실행
#[derive(Debug, Default, Clone, Copy)]
pub struct ImmediateDispatcher;

impl ResultDispatcher for ImmediateDispatcher {
    fn dispatch(&self, callback: PostExecute) {
        callback();
    }
}

/// 콜백 스레드가 직접 꺼내 실행하는 dispatcher
pub struct ChannelDispatcher {
    sender: Mutex<Sender<PostExecute>>,
    receiver: Mutex<Receiver<PostExecute>>,
}

impl ChannelDispatcher {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            sender: Mutex::new(sender),
            receiver: Mutex::new(receiver),
        }
    }

    /// 대기 중인 콜백을 모두 실행하고 실행 수를 반환
    pub fn pump(&self) -> usize {
        let receiver = self.receiver.lock();
        let mut count = 0;
        while let Ok(callback) = receiver.try_recv() {
            callback();
            count += 1;
        }
        count
    }

    /// 콜백 하나를 `timeout`까지 기다린 뒤 나머지도 실행
    pub fn pump_timeout(&self, timeout: Duration) -> usize {
        let receiver = self.receiver.lock();
        match receiver.recv_timeout(timeout) {
            Ok(callback) => {
                callback();
                let mut count = 1;
                while let Ok(callback) = receiver.try_recv() {
                    callback();
                    count += 1;
                }
                count
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => 0,
        }
    }
}

impl Default for ChannelDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultDispatcher for ChannelDispatcher {
    fn dispatch(&self, callback: PostExecute) {
        if self.sender.lock().send(callback).is_err() {
            warn!("result channel closed, dropping callback");
        }
    }
}
