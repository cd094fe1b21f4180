//! 两路会合
//!
//! 选项收集和模型推理各持有一个一次性信号，[`Rendezvous::await_both`]
//! 只有在两个信号都发出之后才返回；任何一方在发出前退出则立即返回错误。

use thiserror::Error;
use tokio::sync::oneshot;

/// 会合的一方没有发出信号就退出了
#[derive(Debug, Error, PartialEq, Eq)]
#[error("会合的一方在发出信号前退出")]
pub struct Abandoned;

/// 一次性信号
pub struct Signal<T> {
    tx: oneshot::Sender<T>,
}

impl<T> Signal<T> {
    pub fn fire(self, value: T) {
        // 接收方已放弃时丢弃即可
        let _ = self.tx.send(value);
    }
}

pub struct Rendezvous<A, B> {
    a: oneshot::Receiver<A>,
    b: oneshot::Receiver<B>,
}

/// 创建一对信号和对应的会合点
pub fn rendezvous<A, B>() -> (Signal<A>, Signal<B>, Rendezvous<A, B>) {
    let (a_tx, a_rx) = oneshot::channel();
    let (b_tx, b_rx) = oneshot::channel();
    (
        Signal { tx: a_tx },
        Signal { tx: b_tx },
        Rendezvous { a: a_rx, b: b_rx },
    )
}

impl<A, B> Rendezvous<A, B> {
    pub async fn await_both(self) -> Result<(A, B), Abandoned> {
        tokio::try_join!(self.a, self.b).map_err(|_| Abandoned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::time::{Duration, Instant};

    #[tokio::test]
    async fn both_values_are_delivered() {
        let (a, b, point) = rendezvous::<u8, &str>();
        b.fire("ready");
        a.fire(7);
        assert_eq!(point.await_both().await, Ok((7, "ready")));
    }

    #[tokio::test]
    async fn dropping_one_side_short_circuits() {
        let (a, b, point) = rendezvous::<u8, u8>();
        drop(a);
        let waiting = tokio::spawn(point.await_both());
        let result = tokio::time::timeout(Duration::from_secs(1), waiting)
            .await
            .expect("不应等待另一方")
            .unwrap();
        assert_eq!(result, Err(Abandoned));
        drop(b);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn action_never_precedes_either_signal(delay_a in 0u64..15, delay_b in 0u64..15) {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_time()
                .build()
                .unwrap();

            let (fired_a, fired_b, acted) = runtime.block_on(async move {
                let (a, b, point) = rendezvous::<Instant, Instant>();
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(delay_a)).await;
                    a.fire(Instant::now());
                });
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(delay_b)).await;
                    b.fire(Instant::now());
                });
                let (fired_a, fired_b) = point.await_both().await.unwrap();
                (fired_a, fired_b, Instant::now())
            });

            prop_assert!(acted >= fired_a);
            prop_assert!(acted >= fired_b);
        }
    }
}
