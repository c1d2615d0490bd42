//! Simulation statistics collection and reporting.
//!
//! Tracks cycle/instruction counts, stall breakdowns, cache hit rates, TLB activity,
//! and exceptions taken, for a post-run report in the style of a typical simulator's
//! performance summary.

use std::time::Instant;

/// Execution statistics for one [`crate::cpu::Cpu`] run.
#[derive(Clone)]
pub struct Stats {
    start_time: Instant,
    /// Total cycles elapsed (including stalls).
    pub cycles: u64,
    /// Number of instructions committed at WB.
    pub instructions_retired: u64,
    /// Number of exceptions (traps and interrupts) delivered.
    pub exceptions_taken: u64,

    /// Cycles lost to the one-cycle load-use hazard.
    pub stalls_load_use: u64,

    /// I-cache hits.
    pub icache_hits: u64,
    /// I-cache misses (each incurring a line-fill stall).
    pub icache_misses: u64,
    /// D-cache hits.
    pub dcache_hits: u64,
    /// D-cache misses.
    pub dcache_misses: u64,

    /// TLBWI/TLBWR writes committed.
    pub tlb_refills: u64,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            start_time: Instant::now(),
            cycles: 0,
            instructions_retired: 0,
            exceptions_taken: 0,
            stalls_load_use: 0,
            icache_hits: 0,
            icache_misses: 0,
            dcache_hits: 0,
            dcache_misses: 0,
            tlb_refills: 0,
        }
    }
}

impl Stats {
    /// Prints a full statistics report to stdout.
    pub fn print(&self) {
        let seconds = self.start_time.elapsed().as_secs_f64();
        let cyc = self.cycles.max(1);
        let instr = self.instructions_retired.max(1);
        let ipc = self.instructions_retired as f64 / cyc as f64;
        let mips = (self.instructions_retired as f64 / seconds) / 1_000_000.0;

        println!("\n==========================================================");
        println!("N64 CPU SIMULATION STATISTICS");
        println!("==========================================================");
        println!("host_seconds             {seconds:.4} s");
        println!("sim_cycles               {}", self.cycles);
        println!("sim_insts                {}", self.instructions_retired);
        println!("sim_ipc                  {ipc:.4}");
        println!("sim_mips                 {mips:.2}");
        println!("exceptions_taken         {}", self.exceptions_taken);
        println!("----------------------------------------------------------");
        println!(
            "stalls.load_use          {} ({:.2}%)",
            self.stalls_load_use,
            (self.stalls_load_use as f64 / cyc as f64) * 100.0
        );
        println!("----------------------------------------------------------");
        print_cache("icache", self.icache_hits, self.icache_misses);
        print_cache("dcache", self.dcache_hits, self.dcache_misses);
        println!("tlb.refills              {}", self.tlb_refills);
        println!("==========================================================");
        let _ = instr;
    }
}

fn print_cache(name: &str, hits: u64, misses: u64) {
    let total = hits + misses;
    let rate = if total > 0 { (hits as f64 / total as f64) * 100.0 } else { 0.0 };
    println!("{name:<8} accesses: {total:<10} | hits: {hits:<10} | hit_rate: {rate:.2}%");
}
