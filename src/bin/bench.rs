//! VM benchmark binary.
//!
//! Measures execution time for representative Intcode programs.
//! Run with: `cargo run --release --bin bench`

use std::time::{Duration, Instant};

use intcode::network::pipeline::{FEEDBACK_PHASES, max_signal};
use intcode::virtual_machine::program::Program;
use intcode::virtual_machine::vm::Machine;

// ---------------------------------------------------------------------------
// Benchmark harness
// ---------------------------------------------------------------------------

struct BenchResult {
    name: &'static str,
    iterations: u64,
    total: Duration,
    /// Instructions executed by the last run (None to omit column).
    steps: Option<u64>,
}

impl BenchResult {
    fn avg(&self) -> Duration {
        self.total / self.iterations as u32
    }

    fn print(&self) {
        let avg = self.avg();
        let ns_per_op = avg.as_nanos();
        let steps = self
            .steps
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".to_string());
        let ns_per_instr = self
            .steps
            .filter(|&n| n > 0)
            .map(|n| format!("{:>8.1}", ns_per_op as f64 / n as f64))
            .unwrap_or_else(|| "       -".to_string());
        println!(
            "  {:<30} {:>7} iters {:>10.3} us/iter {:>12} steps  {} ns/instr",
            self.name,
            self.iterations,
            ns_per_op as f64 / 1000.0,
            steps,
            ns_per_instr,
        );
    }
}

/// Runs `f` for at least `min_duration`, returning aggregated results.
fn bench<F>(name: &'static str, min_duration: Duration, mut f: F) -> BenchResult
where
    F: FnMut() -> Option<u64>,
{
    // Warmup
    for _ in 0..5 {
        f();
    }

    let mut iterations = 0u64;
    let mut last_steps = None;
    let start = Instant::now();
    while start.elapsed() < min_duration {
        last_steps = f();
        iterations += 1;
    }
    let total = start.elapsed();

    BenchResult {
        name,
        iterations,
        total,
        steps: last_steps,
    }
}

/// Runs a program to completion in suspending mode, returns the number of steps.
fn run_steps(program: &Program) -> Option<u64> {
    let mut vm = Machine::new(program);
    vm.run_until_input().expect("run failed");
    Some(vm.steps())
}

// ---------------------------------------------------------------------------
// Benchmark definitions
// ---------------------------------------------------------------------------

/// mem[20] = n; do { mem[20] -= 1 } while mem[20] != 0
fn countdown(n: i64) -> Program {
    Program::new(vec![1101, 0, n, 20, 1001, 20, -1, 20, 1005, 20, 4, 99])
}

/// Accumulates (i * 3 + 1) and compares it against i on every iteration.
fn arithmetic_mix(n: i64) -> Program {
    Program::new(vec![
        1101, 0, n, 100, // i = n
        1002, 100, 3, 101, // t = i * 3
        1001, 101, 1, 101, // t += 1
        1, 101, 102, 102, // acc += t
        7, 100, 101, 103, // lt = i < t
        8, 100, 101, 104, // eq = i == t
        1001, 100, -1, 100, // i -= 1
        1005, 100, 4, // loop while i != 0
        99,
    ])
}

/// Writes n cells above address 2000 through the relative base.
fn memory_fill(n: i64) -> Program {
    Program::new(vec![
        109, 2000, // rb = 2000
        1101, 0, n, 1000, // i = n
        20101, 0, 1000, 0, // mem[rb] = i
        109, 1, // rb += 1
        1001, 1000, -1, 1000, // i -= 1
        1005, 1000, 6, // loop while i != 0
        99,
    ])
}

const QUINE: &[i64] = &[
    109, 1, 204, -1, 1001, 100, 1, 100, 1008, 100, 16, 101, 1006, 101, 0, 99,
];

const FEEDBACK: &[i64] = &[
    3, 26, 1001, 26, -4, 26, 3, 27, 1002, 27, 2, 27, 1, 27, 26, 27, 4, 27, 1001, 28, -1, 28, 1005,
    28, 6, 99, 0, 0, 5,
];

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() {
    let min = Duration::from_secs(2);

    println!("VM Benchmarks (each runs for >= 2s)\n");
    println!(
        "  {:<30} {:>7}       {:>14} {:>12}  {:>10}",
        "benchmark", "iters", "avg time", "steps/run", "ns/instr"
    );
    println!("  {}", "-".repeat(84));

    // 1. Countdown variants
    for &n in &[1_000i64, 100_000] {
        let name: &'static str = match n {
            1_000 => "countdown(1K)",
            100_000 => "countdown(100K)",
            _ => unreachable!(),
        };
        let program = countdown(n);
        bench(name, min, || run_steps(&program)).print();
    }

    // 2. Arithmetic mix (10K iterations)
    let program = arithmetic_mix(10_000);
    bench("arithmetic_mix(10K)", min, || run_steps(&program)).print();

    // 3. Memory growth through the relative base (5K cells)
    let program = memory_fill(5_000);
    bench("memory_fill(5K)", min, || run_steps(&program)).print();

    // 4. Relative-mode quine
    let program = Program::from(QUINE);
    bench("quine", min, || run_steps(&program)).print();

    // 5. Feedback loop phase search (120 orderings, 5 tasks each)
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime");
    let program = Program::from(FEEDBACK);
    bench("feedback_search(5!)", min, || {
        runtime
            .block_on(max_signal(&program, &FEEDBACK_PHASES, true))
            .expect("search failed");
        None
    })
    .print();

    println!();
}
