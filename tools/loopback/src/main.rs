//! Loopback negotiation between two sessions in one process
//!
//! Creates an offerer and an answerer over the webrtc-rs engine, exchanges
//! the offer, answer and ICE candidates directly, waits for ICE to connect,
//! sends one message over a data channel, prints stats and shuts both
//! sessions down.
//!
//! # Usage
//!
//! ```bash
//! # Host candidates only
//! cargo run -p signalbridge-loopback
//!
//! # Gather through STUN servers (also read from WEBRTC_CONNECT)
//! cargo run -p signalbridge-loopback -- \
//!   --stun-servers stun:stun.l.google.com:19302 \
//!   --timeout-secs 20
//! ```

use anyhow::{bail, Context, Result};
use clap::Parser;
use crossbeam::channel::{unbounded, Receiver};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use signalbridge_peer::{
    DataChannel, DataChannelInit, DataChannelState, EngineContext, IceCandidate,
    IceConnectionState, IceServer, Notifier, Promise, Session, SessionConfig, ICE_SERVER_ENV,
};
use signalbridge_webrtc::WebRtcEngineFactory;

/// signalbridge loopback
///
/// Negotiates a peer connection between two local sessions.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// STUN servers (comma-separated); host candidates only when empty
    #[arg(long, value_delimiter = ',', env = ICE_SERVER_ENV)]
    stun_servers: Vec<String>,

    /// Engine worker threads (defaults to the number of CPUs)
    #[arg(long, env = "SIGNALBRIDGE_WORKER_THREADS")]
    worker_threads: Option<usize>,

    /// Give up if negotiation has not finished after this many seconds
    #[arg(long, default_value_t = 15)]
    timeout_secs: u64,

    /// Label of the data channel opened by the offerer
    #[arg(long, default_value = "loopback")]
    channel_label: String,

    /// Open the data channel unordered, without retransmits
    #[arg(long)]
    unordered: bool,
}

type CandidateQueue = Rc<RefCell<VecDeque<IceCandidate>>>;

/// Both sessions plus everything needed to pump them from this thread
struct Loopback {
    offerer: Session,
    answerer: Session,
    wake: Receiver<()>,
    to_answerer: CandidateQueue,
    to_offerer: CandidateQueue,
    deadline: Instant,
    shutdown: Arc<AtomicBool>,
}

impl Loopback {
    /// Wait for engine activity, drain both sessions and forward candidates
    fn turn(&mut self) -> Result<()> {
        if self.shutdown.load(Ordering::SeqCst) {
            bail!("interrupted");
        }
        if Instant::now() >= self.deadline {
            bail!("timed out waiting for the engines");
        }

        let _ = self.wake.recv_timeout(Duration::from_millis(50));
        while self.wake.try_recv().is_ok() {}

        self.offerer.drain();
        self.answerer.drain();
        forward(&self.to_answerer, &mut self.answerer);
        forward(&self.to_offerer, &mut self.offerer);
        Ok(())
    }

    fn settle<T>(&mut self, promise: &mut Promise<T>) -> Result<T> {
        loop {
            self.turn()?;
            if let Some(result) = promise.try_take() {
                return Ok(result?);
            }
        }
    }

    fn until(&mut self, what: &str, done: impl Fn(&Self) -> bool) -> Result<()> {
        while !done(self) {
            self.turn().with_context(|| format!("waiting for {}", what))?;
        }
        Ok(())
    }

    fn negotiate(&mut self) -> Result<()> {
        let mut offer = self.offerer.create_offer()?;
        let offer = self.settle(&mut offer).context("createOffer")?;
        let mut set = self.offerer.set_local_description(offer.clone())?;
        self.settle(&mut set).context("offerer setLocalDescription")?;

        let mut set = self.answerer.set_remote_description(offer)?;
        self.settle(&mut set).context("answerer setRemoteDescription")?;

        let mut answer = self.answerer.create_answer()?;
        let answer = self.settle(&mut answer).context("createAnswer")?;
        let mut set = self.answerer.set_local_description(answer.clone())?;
        self.settle(&mut set).context("answerer setLocalDescription")?;

        let mut set = self.offerer.set_remote_description(answer)?;
        self.settle(&mut set).context("offerer setRemoteDescription")?;

        info!(
            offerer = %self.offerer.signaling_state(),
            answerer = %self.answerer.signaling_state(),
            "Negotiation complete"
        );
        Ok(())
    }

    /// Close both sessions and wait until their engines are released
    fn shutdown(&mut self) {
        self.offerer.close();
        self.answerer.close();

        let deadline = Instant::now() + Duration::from_secs(5);
        while !(self.offerer.is_engine_released() && self.answerer.is_engine_released()) {
            if Instant::now() >= deadline {
                warn!("Engines did not report shutdown in time");
                return;
            }
            let _ = self.wake.recv_timeout(Duration::from_millis(50));
            self.offerer.drain();
            self.answerer.drain();
        }
        info!("Both engines released");
    }
}

/// Hand queued candidates to a session once it has a remote description
fn forward(queue: &CandidateQueue, session: &mut Session) {
    if session.remote_description().is_none() {
        return;
    }
    loop {
        let Some(candidate) = queue.borrow_mut().pop_front() else {
            break;
        };
        match session.add_ice_candidate(candidate) {
            Ok(mut accepted) => {
                if let Some(Err(e)) = accepted.try_take() {
                    warn!(session = session.id(), error = %e, "Candidate refused");
                }
            }
            Err(e) => warn!(session = session.id(), error = %e, "Candidate not added"),
        }
    }
}

/// Queue every local candidate of `session` for its peer
fn collect_candidates(session: &mut Session, queue: &CandidateQueue) {
    let queue = queue.clone();
    let id = session.id().to_string();
    session.on_ice_candidate(Some(Box::new(move |candidate: Option<IceCandidate>| {
        match candidate {
            Some(c) => {
                debug!(session = %id, candidate = %c.candidate, "Local candidate");
                queue.borrow_mut().push_back(c);
            }
            None => debug!(session = %id, "Candidate gathering finished"),
        }
    })));
}

fn log_ice_states(session: &mut Session, role: &'static str) {
    session.on_ice_connection_state_change(Some(Box::new(move |state: IceConnectionState| {
        info!(role, state = %state, "ICE connection state changed");
    })));
}

fn session_config(args: &Args) -> SessionConfig {
    if args.stun_servers.is_empty() {
        SessionConfig::host_only()
    } else {
        SessionConfig::default()
            .with_ice_servers(args.stun_servers.iter().map(IceServer::stun).collect())
    }
}

fn run(args: Args, shutdown: Arc<AtomicBool>) -> Result<()> {
    let worker_threads = args.worker_threads.unwrap_or_else(num_cpus::get);
    let ctx = EngineContext::new(WebRtcEngineFactory::with_worker_threads(worker_threads)?);

    let (wake_tx, wake) = unbounded();
    let notifier: Notifier = Arc::new(move || {
        let _ = wake_tx.send(());
    });

    let config = session_config(&args);
    let mut offerer =
        Session::with_notifier(&ctx, config.clone().with_label("offerer"), notifier.clone())?;
    let mut answerer = Session::with_notifier(&ctx, config.with_label("answerer"), notifier)?;

    let to_answerer = CandidateQueue::default();
    let to_offerer = CandidateQueue::default();
    collect_candidates(&mut offerer, &to_answerer);
    collect_candidates(&mut answerer, &to_offerer);
    log_ice_states(&mut offerer, "offerer");
    log_ice_states(&mut answerer, "answerer");

    let remote_channel: Rc<RefCell<Option<Arc<dyn DataChannel>>>> = Rc::default();
    let announced = remote_channel.clone();
    answerer.on_data_channel(Some(Box::new(move |channel: Arc<dyn DataChannel>| {
        info!(label = channel.label(), id = ?channel.id(), "Remote data channel");
        *announced.borrow_mut() = Some(channel);
    })));

    let init = if args.unordered {
        DataChannelInit::unreliable()
    } else {
        DataChannelInit::reliable()
    };
    let channel = offerer.create_data_channel(&args.channel_label, init)?;

    let mut lb = Loopback {
        offerer,
        answerer,
        wake,
        to_answerer,
        to_offerer,
        deadline: Instant::now() + Duration::from_secs(args.timeout_secs),
        shutdown,
    };

    let outcome = exchange(&mut lb, channel.as_ref(), &remote_channel);
    lb.shutdown();
    outcome
}

fn exchange(
    lb: &mut Loopback,
    channel: &dyn DataChannel,
    remote_channel: &Rc<RefCell<Option<Arc<dyn DataChannel>>>>,
) -> Result<()> {
    lb.negotiate()?;

    lb.until("ICE connection", |lb| {
        lb.offerer.ice_connection_state().is_connected()
            && lb.answerer.ice_connection_state().is_connected()
    })?;

    lb.until("data channel", |_| {
        channel.ready_state() == DataChannelState::Open && remote_channel.borrow().is_some()
    })?;
    channel.send_text("hello from the offerer")?;
    info!(label = channel.label(), "Sent greeting");

    let mut stats = lb.offerer.get_stats()?;
    let report = lb.settle(&mut stats).context("getStats")?;
    println!("{} stats entries", report.len());
    for kind in ["candidate-pair", "data-channel", "transport"] {
        println!("  {:<16} {}", kind, report.of_type(kind).count());
    }
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing();

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        if flag.swap(true, Ordering::SeqCst) {
            eprintln!("Shutdown already in progress, exiting");
            std::process::exit(1);
        }
        eprintln!("Ctrl+C received, shutting down");
    })
    .context("Failed to set Ctrl+C handler")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        stun_servers = ?args.stun_servers,
        "signalbridge loopback starting"
    );
    run(args, shutdown)
}
