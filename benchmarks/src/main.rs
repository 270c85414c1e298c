use anyhow::anyhow;
use chrono::{Duration, Utc};
use clap::Parser;
use const_format::concatcp;
use jsonwebtoken::{EncodingKey, Header};
use rand::Rng;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::env;
use std::fs::File;
use std::io::Write;
use std::ops::AddAssign;
use std::process::{self, Child, Command, Stdio};
use std::thread;
use std::time::{Duration as StdDuration, Instant};
use tempfile::NamedTempFile;

const LOCAL_PORT: u32 = 8374;
const LOCAL_URL: &str = concatcp!("http://127.0.0.1:", LOCAL_PORT);

const ADMIN: &str = "0xbenchmark-admin";
const JWT_SECRET: &str = "benchmark-secret";

#[rustfmt::skip]
const ROCKET_ENV: &[(&str, &str)] = &[
    ("ROCKET_PORT", concatcp!(LOCAL_PORT)),
    ("ROCKET_SECRET_KEY", "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"),
    ("ROCKET_ADMIN", ADMIN),
    ("ROCKET_JWT_SECRET", JWT_SECRET),
];

#[rustfmt::skip]
const CANDIDATES: &[&str] = &[
    "Alice",
    "Bob",
    "Carol",
    "Dave",
    "Eve",
    "Fred",
    "Grace",
    "Henry",
    "Irene",
    "Joe",
];

#[derive(Parser)]
struct Args {
    /// Silence local server logging.
    #[arg(short, long)]
    quiet: bool,

    /// Send local server logging to this file; takes precedence over --quiet.
    #[arg(long)]
    logfile: Option<String>,

    /// Connect to a remote server at this URL instead of running a local one.
    #[arg(long)]
    remote: Option<String>,

    /// Administrator identity of the remote server.
    #[arg(long, default_value = ADMIN)]
    admin: String,

    /// Token signing secret shared with the remote server.
    #[arg(long, default_value = JWT_SECRET)]
    jwt_secret: String,

    /// How many threads to use. Defaults to the number of logical CPUs.
    #[arg(long, default_value_t = num_cpus::get())]
    threads: usize,

    /// How many voters each thread handles in each phase.
    #[arg(long, default_value_t = 100)]
    voters_per_thread: usize,

    /// How many wallets go into each batch request.
    #[arg(long, default_value_t = 50)]
    batch_size: usize,

    /// Audit the election dump after voting.
    #[arg(long)]
    verify: bool,
}

/// Construct a URL from segments.
macro_rules! url {
    ($($segment:expr),+) => {{
        std::path::PathBuf::from_iter([$($segment),+]).to_str().unwrap()
    }}
}

/// Token claims, as the server expects them.
#[derive(Serialize)]
struct Claims<'a> {
    sub: &'a str,
    exp: i64,
}

/// Mint a short-lived caller token.
fn token(secret: &str, caller: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: caller,
        exp: (Utc::now() + Duration::hours(1)).timestamp(),
    };
    Ok(jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?)
}

/// A wallet identity for the `n`th benchmark voter.
fn wallet(n: usize) -> String {
    format!("0x{:040x}", n + 1)
}

/// Everything a benchmark thread needs to talk to the server.
struct Session<'a> {
    url: &'a str,
    secret: &'a str,
    admin: &'a str,
}

impl Session<'_> {
    /// Send `request` with a token attesting `caller`.
    fn as_caller(&self, caller: &str, request: RequestBuilder) -> anyhow::Result<Response> {
        Ok(request
            .bearer_auth(token(self.secret, caller)?)
            .send()
            .and_then(Response::error_for_status)?)
    }

    /// POST `body` as the admin, returning how long it took.
    fn admin_post(
        &self,
        client: &Client,
        path: &str,
        body: Value,
    ) -> anyhow::Result<StdDuration> {
        let request = client.post(url!(self.url, path)).json(&body);
        let start = Instant::now();
        self.as_caller(self.admin, request)?;
        Ok(start.elapsed())
    }
}

/// Set up everything we need before starting the server.
fn setup_deps() -> anyhow::Result<()> {
    // Ensure the optimised build is up-to-date.
    Command::new("cargo")
        .args(["build", "--release", "--bin", "evote-ledger"])
        .status()?
        .success()
        .then_some(())
        .ok_or_else(|| anyhow!("server build exited nonzero"))?;

    for (var, val) in ROCKET_ENV {
        env::set_var(var, val);
    }

    Ok(())
}

/// Terminate the given child process. This is a SIGTERM on unix and a hard-kill on other
/// platforms.
fn terminate_child(child: &mut Child) -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        let pid = nix::unistd::Pid::from_raw(child.id() as i32);
        nix::sys::signal::kill(pid, nix::sys::signal::Signal::SIGTERM)?;
    }
    #[cfg(not(unix))]
    {
        child.kill()?;
    }
    Ok(())
}

/// Start the server and wait until it answers.
fn launch_server(logfile: Stdio) -> anyhow::Result<Child> {
    let mut proc = Command::new("./target/release/evote-ledger")
        .stdout(logfile)
        .spawn()?;

    #[derive(Deserialize)]
    struct CallerInfo {
        caller: Option<String>,
    }

    // Wait for the server to be reachable.
    let client = Client::new();
    loop {
        let resp = client
            .get(url!(LOCAL_URL, "auth/check"))
            .send()
            .and_then(Response::error_for_status);

        if let Ok(resp) = resp {
            match resp.json::<CallerInfo>() {
                Ok(CallerInfo { caller: None }) => break,
                other => {
                    terminate_child(&mut proc)?;
                    proc.wait()?;
                    return Err(anyhow!("Bad response: {:?}", other.map(|info| info.caller)));
                }
            }
        }

        // Check the server didn't exit.
        if let Some(retcode) = proc.try_wait()? {
            return Err(anyhow!("Server exited prematurely with code {}", retcode));
        }
        thread::sleep(StdDuration::from_millis(50));
    }

    Ok(proc)
}

/// Average durations of each benchmarked operation.
#[derive(Debug, Default)]
struct Timings {
    create_election: StdDuration,
    create_credential: StdDuration,
    create_credentials_batch: StdDuration,
    add_funds_batch: StdDuration,
    sequential_vote: StdDuration,
    parallel_vote: StdDuration,
}

/// A running total that can be averaged.
#[derive(Debug, Default, Copy, Clone)]
struct Total {
    elapsed: StdDuration,
    count: u32,
}

impl Total {
    fn average(&self) -> StdDuration {
        self.elapsed.checked_div(self.count).unwrap_or_default()
    }
}

impl AddAssign<StdDuration> for Total {
    fn add_assign(&mut self, rhs: StdDuration) {
        self.elapsed += rhs;
        self.count += 1;
    }
}

impl AddAssign for Total {
    fn add_assign(&mut self, rhs: Self) {
        self.elapsed += rhs.elapsed;
        self.count += rhs.count;
    }
}

/// Run `work` on `num_threads` threads, each given its thread index, and sum
/// their totals.
fn in_parallel<F>(num_threads: usize, work: F) -> anyhow::Result<Total>
where
    F: Fn(usize) -> anyhow::Result<Total> + Sync,
{
    thread::scope(|s| {
        let threads: Vec<_> = (0..num_threads)
            .map(|index| {
                let work = &work;
                s.spawn(move || work(index))
            })
            .collect();

        let mut total = Total::default();
        for t in threads {
            total += t.join().expect("thread panicked")?;
        }
        Ok(total)
    })
}

/// Create a batch of throwaway elections, then the one we vote in. Returns
/// the ID of the latter.
fn setup_elections(session: &Session, timings: &mut Timings) -> anyhow::Result<u64> {
    const ELECTIONS: usize = 20;
    let client = Client::new();

    let start = Utc::now() - Duration::hours(1);
    let end = start + Duration::hours(4);
    let mut total = Total::default();
    let mut election_id = 0;
    for n in 0..ELECTIONS {
        let election = json!({
            "name": format!("Benchmark Election {n}"),
            "description": "Created by the benchmark",
            "start_time": start,
            "end_time": end,
        });
        let request = client.post(url!(session.url, "elections")).json(&election);
        let pre_create = Instant::now();
        let resp = session.as_caller(session.admin, request)?;
        total += pre_create.elapsed();

        #[derive(Deserialize)]
        struct ElectionCreated {
            election_id: u64,
        }
        #[derive(Deserialize)]
        struct Created {
            election_created: ElectionCreated,
        }
        election_id = resp.json::<Created>()?.election_created.election_id;
    }
    timings.create_election = total.average();

    let eid = election_id.to_string();
    for name in CANDIDATES {
        session.admin_post(
            &client,
            url!("elections", &eid, "candidates"),
            json!({ "name": name }),
        )?;
    }
    session.admin_post(&client, url!("elections", &eid, "start"), Value::Null)?;

    Ok(election_id)
}

/// Register every voter, half one at a time and half in batches.
fn setup_credentials(
    session: &Session,
    args: &Args,
    timings: &mut Timings,
) -> anyhow::Result<()> {
    let per_thread = args.voters_per_thread;

    let single = in_parallel(args.threads, |index| {
        let client = Client::new();
        let mut total = Total::default();
        for n in (index * per_thread)..(index * per_thread + per_thread / 2) {
            total += session.admin_post(&client, "credentials", json!({ "wallet": wallet(n) }))?;
        }
        Ok(total)
    })?;
    timings.create_credential = single.average();

    let batched = in_parallel(args.threads, |index| {
        let client = Client::new();
        let mut total = Total::default();
        let wallets: Vec<_> = ((index * per_thread + per_thread / 2)..((index + 1) * per_thread))
            .map(wallet)
            .collect();
        for batch in wallets.chunks(args.batch_size.max(1)) {
            total += session.admin_post(
                &client,
                "credentials/batch",
                json!({ "wallets": batch }),
            )?;
        }
        Ok(total)
    })?;
    timings.create_credentials_batch = batched.average();

    let client = Client::new();
    let wallets: Vec<_> = (0..args.threads * per_thread).map(wallet).collect();
    let mut total = Total::default();
    for batch in wallets.chunks(args.batch_size.max(1)) {
        total += session.admin_post(
            &client,
            "credentials/funds",
            json!({ "wallets": batch, "total_amount": 1_000 * batch.len() as u64 }),
        )?;
    }
    timings.add_funds_batch = total.average();

    Ok(())
}

/// Cast a vote for a random candidate as voter `n`.
fn cast_vote(
    session: &Session,
    client: &Client,
    eid: &str,
    n: usize,
) -> anyhow::Result<StdDuration> {
    let candidate_id = rand::thread_rng().gen_range(1..=CANDIDATES.len());
    let request = client
        .post(url!(session.url, "elections", eid, "vote"))
        .json(&json!({ "candidate_id": candidate_id }));
    let start = Instant::now();
    session.as_caller(&wallet(n), request)?;
    Ok(start.elapsed())
}

/// Have the first thread's voters vote one after another, then everyone
/// else all at once.
fn benchmark_votes(
    session: &Session,
    args: &Args,
    eid: &str,
    timings: &mut Timings,
) -> anyhow::Result<()> {
    let per_thread = args.voters_per_thread;

    let client = Client::new();
    let mut sequential = Total::default();
    for n in 0..per_thread {
        sequential += cast_vote(session, &client, eid, n)?;
    }
    timings.sequential_vote = sequential.average();

    // The first thread's voters have already voted.
    let parallel_threads = args.threads.saturating_sub(1);
    let start = Instant::now();
    let parallel = in_parallel(parallel_threads, |index| {
        let client = Client::new();
        let mut total = Total::default();
        for n in ((index + 1) * per_thread)..((index + 2) * per_thread) {
            total += cast_vote(session, &client, eid, n)?;
        }
        Ok(total)
    })?;
    let total_duration = start.elapsed();
    timings.parallel_vote = parallel.average();

    if parallel.count > 0 {
        // Actual votes per sec is total_votes / total_time.
        let actual_votes_per_sec = parallel.count as f64 / total_duration.as_secs_f64();
        println!(
            "parallel voting: {} votes in {:?} ({:.2}/s)",
            parallel.count, total_duration, actual_votes_per_sec
        );
    }

    Ok(())
}

/// Ensure that all dependencies for the auditor are ready.
fn setup_auditor() -> anyhow::Result<()> {
    // Build the binary.
    Command::new("cargo")
        .args([
            "build",
            "--release",
            "--bin",
            "ledger-audit",
            "--features",
            "audit",
        ])
        .status()?
        .success()
        .then_some(())
        .ok_or_else(|| anyhow!("ledger-audit build exited nonzero"))?;

    Ok(())
}

/// Return `Ok(())` if the election dump passes the audit.
fn verify(session: &Session, eid: &str) -> anyhow::Result<()> {
    let client = Client::new();
    session.admin_post(&client, url!("elections", eid, "end"), Value::Null)?;

    let dump = client
        .get(url!(session.url, "elections", eid, "dump"))
        .send()
        .and_then(Response::error_for_status)?
        .bytes()?;

    // Dump the dump to a file and run the auditor on it.
    let mut f = NamedTempFile::new()?;
    f.write_all(&dump)?;
    f.flush()?;

    Command::new("./target/release/ledger-audit")
        .arg(f.path())
        .stdout(Stdio::null())
        .status()?
        .success()
        .then_some(())
        .ok_or_else(|| anyhow!("audit failed"))?;

    println!("audit: passed");
    Ok(())
}

fn report(timings: &Timings) {
    println!("create election:    {:?}", timings.create_election);
    println!("create credential:  {:?}", timings.create_credential);
    println!("batch credentials:  {:?}", timings.create_credentials_batch);
    println!("batch funding:      {:?}", timings.add_funds_batch);
    println!("sequential vote:    {:?}", timings.sequential_vote);
    println!("parallel vote:      {:?}", timings.parallel_vote);
}

fn run() -> anyhow::Result<()> {
    let args = Args::parse();
    let url = args.remote.as_deref().unwrap_or(LOCAL_URL);
    let session = Session {
        url,
        secret: &args.jwt_secret,
        admin: &args.admin,
    };

    // Pre-build the auditor if requested.
    if args.verify {
        setup_auditor()?;
    }

    // If we're not connecting remotely, bring up a local server.
    let mut proc: Option<Child> = None;
    if args.remote.is_none() {
        setup_deps()?;
        let logfile = match &args.logfile {
            Some(path) => Stdio::from(File::create(path)?),
            None => {
                if args.quiet {
                    Stdio::null()
                } else {
                    Stdio::inherit()
                }
            }
        };
        proc = Some(launch_server(logfile)?);
    }

    // Use a closure to ensure the cleanup below runs.
    let result = (|| {
        let mut timings = Timings::default();
        let election_id = setup_elections(&session, &mut timings)?;
        let eid = election_id.to_string();
        setup_credentials(&session, &args, &mut timings)?;
        benchmark_votes(&session, &args, &eid, &mut timings)?;
        report(&timings);

        // Verify if requested.
        if args.verify {
            verify(&session, &eid)?;
        }

        Ok(())
    })();

    // Kill the server.
    if let Some(p) = proc.as_mut() {
        terminate_child(p)?;
        p.wait()?;
    }

    result
}

fn main() {
    if let Err(e) = run() {
        eprintln!("FATAL: {}", e);
        process::exit(1);
    }
}
