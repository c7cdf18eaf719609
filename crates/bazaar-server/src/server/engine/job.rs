//! Jobs and their return channels.
//!
//! A [`Job`] bundles a deferred provider call (its [`Payload`]) with the
//! sending half of a private oneshot channel. The submitter keeps the matching
//! [`ReturnChannel`] and awaits exactly one [`JobResult`] on it.

use bazaar_core::{Error, OfferDetail, OfferList, Result};
use core::{
    fmt,
    pin::Pin,
    task::{Context, Poll},
};
use futures::future::BoxFuture;
use std::future::Future;
use tokio::sync::oneshot;

/// Success value of a job, tagged by the kind of provider call that produced
/// it.
#[derive(Clone, Debug, PartialEq)]
pub enum JobValue {
    Offers(OfferList),
    Detail(OfferDetail),
}

impl JobValue {
    pub fn into_offers(self) -> Result<OfferList> {
        match self {
            Self::Offers(list) => Ok(list),
            Self::Detail(_) => Err(Error::UnexpectedJobValue {
                expected: "offer list",
            }),
        }
    }

    pub fn into_detail(self) -> Result<OfferDetail> {
        match self {
            Self::Detail(detail) => Ok(detail),
            Self::Offers(_) => Err(Error::UnexpectedJobValue {
                expected: "offer detail",
            }),
        }
    }
}

impl From<OfferList> for JobValue {
    fn from(list: OfferList) -> Self {
        Self::Offers(list)
    }
}

impl From<OfferDetail> for JobValue {
    fn from(detail: OfferDetail) -> Self {
        Self::Detail(detail)
    }
}

/// Outcome of executing a job. An error means the value is not trusted.
pub type JobResult = Result<JobValue>;

/// Zero-argument callable producing the job's future.
pub type Payload = Box<dyn FnOnce() -> BoxFuture<'static, JobResult> + Send>;

/// A unit of deferred work bound to one provider call.
pub struct Job {
    label: String,
    payload: Payload,
    reply: oneshot::Sender<JobResult>,
}

impl Job {
    /// Creates a job and the channel its single result will arrive on.
    ///
    /// `label` identifies the job in logs and errors, e.g.
    /// `"walmart.com:search"`. The payload is not invoked until a worker
    /// picks the job up.
    pub fn new<F, Fut, T>(label: impl Into<String>, payload: F) -> (Self, ReturnChannel)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Into<JobValue>,
    {
        let label = label.into();
        let (reply, rx) = oneshot::channel();
        let payload: Payload = Box::new(move || {
            let fut = payload();
            Box::pin(async move { fut.await.map(Into::into) })
        });

        let output = ReturnChannel {
            label: label.clone(),
            rx,
        };

        (
            Self {
                label,
                payload,
                reply,
            },
            output,
        )
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns `true` once the submitter has dropped its [`ReturnChannel`].
    pub fn is_abandoned(&self) -> bool {
        self.reply.is_closed()
    }

    pub(crate) fn into_parts(self) -> (String, Payload, oneshot::Sender<JobResult>) {
        (self.label, self.payload, self.reply)
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("label", &self.label)
            .field("abandoned", &self.is_abandoned())
            .finish_non_exhaustive()
    }
}

/// Receiving half of a job's private result channel.
///
/// Resolves to the job's [`JobResult`], or to [`Error::JobAbandoned`] if the
/// job was dropped without ever producing one (for example when it was
/// discarded during shutdown).
#[derive(Debug)]
pub struct ReturnChannel {
    label: String,
    rx: oneshot::Receiver<JobResult>,
}

impl ReturnChannel {
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl Future for ReturnChannel {
    type Output = JobResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(Error::JobAbandoned {
                label: self.label.clone(),
            })),
            Poll::Pending => Poll::Pending,
        }
    }
}
