use crate::error::SolverError;
use crate::individual::Individual;
use crate::param::{self, BinaryCrossover, BinaryMutation, RealCrossover, RealMutation};
use crate::population::Population;
use crate::problem::{Bounds, Decision, MultiObjectiveProblem};
use log::{debug, warn};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Mating attempts allowed to complete an offspring made of unseen decisions
const MAX_MATING_ATTEMPTS: usize = 100;
/// Probability that a pair of parents is recombined at all
const CROSSOVER_PROB: f64 = 0.9;
/// Per-variable probability of SBX recombination
const SBX_VAR_PROB: f64 = 0.5;

//-----------------------------------------------------------------------------
// Optimizer capability
//-----------------------------------------------------------------------------

/// Final non-dominated feasible decisions of a search
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ParetoSet {
    pub solutions: Vec<Decision>,
    /// Minimized objective vectors, parallel to `solutions`
    pub objectives: Vec<Vec<f64>>,
    pub evaluations: usize,
    pub generations: usize,
}

impl ParetoSet {
    pub fn len(&self) -> usize {
        self.solutions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.solutions.is_empty()
    }
}

pub trait Optimizer: Sync {
    fn solve(&self, problem: &dyn MultiObjectiveProblem) -> Result<ParetoSet, SolverError>;
}

//-----------------------------------------------------------------------------
// NSGA-II with mixed real/binary encoding
//-----------------------------------------------------------------------------

/// NSGA-II over `[c, gamma, bit_0..bit_n]`, with constrained tournament and survival
#[derive(Clone, Debug)]
pub struct Nsga2 {
    pub p_size: usize,
    pub n_eval: usize,
    pub seed: u64,
    pub etac: f64,
    pub etam: f64,
    pub crossover_real: RealCrossover,
    pub crossover_bin: BinaryCrossover,
    pub mutation_real: RealMutation,
    pub mutation_bin: BinaryMutation,
    pub time_limit_secs: f64,
    pub thread_number: usize,
    running: Arc<AtomicBool>,
}

impl Nsga2 {
    pub fn new(optimizer: &param::Optimizer, thread_number: usize) -> Nsga2 {
        Nsga2 {
            p_size: optimizer.p_size,
            n_eval: optimizer.n_eval,
            seed: optimizer.seed,
            etac: optimizer.etac,
            etam: optimizer.etam,
            crossover_real: optimizer.crossover_real,
            crossover_bin: optimizer.crossover_bin,
            mutation_real: optimizer.mutation_real,
            mutation_bin: optimizer.mutation_bin,
            time_limit_secs: optimizer.time_limit_secs,
            thread_number,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Share a flag whose clearing interrupts the search at the next generation
    pub fn with_stop_flag(mut self, running: Arc<AtomicBool>) -> Nsga2 {
        self.running = running;
        self
    }

    fn check_limits(&self, start: &Instant, evaluations: usize) -> Result<(), SolverError> {
        if !self.running.load(Ordering::Relaxed) {
            return Err(SolverError::Interrupted { evaluations });
        }
        if self.time_limit_secs > 0.0 && start.elapsed().as_secs_f64() > self.time_limit_secs {
            return Err(SolverError::Timeout { limit_secs: self.time_limit_secs, evaluations });
        }
        Ok(())
    }

    /// Random initial individuals with distinct decisions
    fn sample(&self, n: usize, n_features: usize, bounds: &Bounds, rng: &mut ChaCha8Rng) -> Population {
        let mut population = Population::new();
        let mut seen: HashSet<u64> = HashSet::new();
        let mut attempts = 0;
        while population.len() < n && attempts < n * MAX_MATING_ATTEMPTS {
            let individual = Individual::random(n_features, bounds, rng);
            if seen.insert(individual.hash) {
                population.individuals.push(individual);
            }
            attempts += 1;
        }
        population
    }

    /// Binary tournament: constraint violation, then dominance, then crowding, then a coin flip
    fn tournament<'a>(&self, population: &'a Population, rng: &mut ChaCha8Rng) -> &'a Individual {
        let a = &population.individuals[rng.gen_range(0..population.len())];
        let b = &population.individuals[rng.gen_range(0..population.len())];

        if !a.is_feasible() || !b.is_feasible() {
            if a.constraint_violation < b.constraint_violation {
                return a;
            } else if b.constraint_violation < a.constraint_violation {
                return b;
            }
        } else if a.dominates(b) {
            return a;
        } else if b.dominates(a) {
            return b;
        } else if a.crowding_distance > b.crowding_distance {
            return a;
        } else if b.crowding_distance > a.crowding_distance {
            return b;
        }

        if rng.gen_bool(0.5) {
            a
        } else {
            b
        }
    }

    /// Two children from two parents, reals and bits recombined and mutated independently
    fn mate(&self, p1: &Individual, p2: &Individual, bounds: &Bounds, rng: &mut ChaCha8Rng) -> [Individual; 2] {
        let mut reals1 = [p1.decision.c, p1.decision.gamma];
        let mut reals2 = [p2.decision.c, p2.decision.gamma];
        let limits = [bounds.c, bounds.gamma];

        if rng.gen::<f64>() < CROSSOVER_PROB {
            match self.crossover_real {
                RealCrossover::Sbx => {
                    for v in 0..2 {
                        if rng.gen::<f64>() < SBX_VAR_PROB {
                            let (c1, c2) = sbx(reals1[v], reals2[v], limits[v], self.etac, rng);
                            reals1[v] = c1;
                            reals2[v] = c2;
                        }
                    }
                }
            }
        }

        let mut bits1 = p1.decision.feature_mask.clone();
        let mut bits2 = p2.decision.feature_mask.clone();
        if rng.gen::<f64>() < CROSSOVER_PROB {
            match self.crossover_bin {
                BinaryCrossover::TwoPoint => point_crossover(&mut bits1, &mut bits2, 2, rng),
                BinaryCrossover::OnePoint => point_crossover(&mut bits1, &mut bits2, 1, rng),
                BinaryCrossover::Uniform => uniform_crossover(&mut bits1, &mut bits2, rng),
            }
        }

        let mut mutate = |mut reals: [f64; 2], mut bits: Vec<bool>| {
            match self.mutation_real {
                RealMutation::Polynomial => {
                    let prob = 1.0 / reals.len() as f64;
                    for v in 0..2 {
                        if rng.gen::<f64>() < prob {
                            reals[v] = polynomial_mutation(reals[v], limits[v], self.etam, rng);
                        }
                    }
                }
            }
            match self.mutation_bin {
                BinaryMutation::Bitflip => bitflip(&mut bits, rng),
            }
            Individual::new(Decision { c: reals[0], gamma: reals[1], feature_mask: bits })
        };

        [mutate(reals1, bits1), mutate(reals2, bits2)]
    }

    /// Up to `n` children whose decisions are new to the population and to each other
    fn offspring(&self, population: &Population, n: usize, bounds: &Bounds, rng: &mut ChaCha8Rng) -> Population {
        let mut children = Population::new();
        let mut seen: HashSet<u64> = population.individuals.iter().map(|i| i.hash).collect();
        let mut attempts = 0;

        while children.len() < n && attempts < MAX_MATING_ATTEMPTS {
            let wanted = n - children.len();
            let mut produced = 0;
            while produced < wanted {
                let p1 = self.tournament(population, rng);
                let p2 = self.tournament(population, rng);
                for child in self.mate(p1, p2, bounds, rng) {
                    produced += 1;
                    if children.len() < n && seen.insert(child.hash) {
                        children.individuals.push(child);
                    }
                }
            }
            attempts += 1;
        }

        if attempts > 1 {
            debug!("Offspring completed after {} mating rounds ({} children)", attempts, children.len());
        }
        children
    }

    /// Evaluate in order, on a rayon pool when one could be built
    fn evaluate(&self, population: &mut Population, problem: &dyn MultiObjectiveProblem, pool: Option<&rayon::ThreadPool>) {
        match pool {
            Some(pool) => pool.install(|| {
                population
                    .individuals
                    .par_iter_mut()
                    .for_each(|individual| individual.set_evaluation(problem.evaluate(&individual.decision)))
            }),
            None => population
                .individuals
                .iter_mut()
                .for_each(|individual| individual.set_evaluation(problem.evaluate(&individual.decision))),
        }
    }
}

impl Optimizer for Nsga2 {
    fn solve(&self, problem: &dyn MultiObjectiveProblem) -> Result<ParetoSet, SolverError> {
        let start = Instant::now();
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let n_features = problem.n_features();
        let bounds = problem.bounds();

        let pool = match rayon::ThreadPoolBuilder::new().num_threads(self.thread_number).build() {
            Ok(pool) => Some(pool),
            Err(e) => {
                warn!("Evaluation thread pool not available ({}): evaluating sequentially", e);
                None
            }
        };

        let mut evaluations = 0;
        self.check_limits(&start, evaluations)?;

        let mut population = self.sample(self.p_size.min(self.n_eval), n_features, &bounds, &mut rng);
        self.evaluate(&mut population, problem, pool.as_ref());
        evaluations += population.len();
        population.survive(self.p_size);

        if population.is_empty() {
            return Err(SolverError::NoFeasibleSolution { evaluations });
        }

        let mut generations = 0;
        while evaluations < self.n_eval {
            self.check_limits(&start, evaluations)?;

            let wanted = self.p_size.min(self.n_eval - evaluations);
            let mut children = self.offspring(&population, wanted, &bounds, &mut rng);
            if children.is_empty() {
                debug!("No new decision could be produced: stopping after {} evaluations", evaluations);
                break;
            }
            self.evaluate(&mut children, problem, pool.as_ref());
            evaluations += children.len();

            population.add(children);
            population.survive(self.p_size);
            generations += 1;

            debug!(
                "Generation #{} | {} evaluations | first front: {} | feasible: {}",
                generations,
                evaluations,
                population.pareto_front().len(),
                population.individuals.iter().filter(|i| i.is_feasible()).count()
            );
        }

        let front = population.pareto_front();
        if front.is_empty() {
            return Err(SolverError::NoFeasibleSolution { evaluations });
        }

        Ok(ParetoSet {
            solutions: front.iter().map(|i| i.decision.clone()).collect(),
            objectives: front.iter().map(|i| i.objectives.clone()).collect(),
            evaluations,
            generations,
        })
    }
}

//-----------------------------------------------------------------------------
// Variation operators
//-----------------------------------------------------------------------------

/// Bounded simulated binary crossover of two real values
pub fn sbx(x1: f64, x2: f64, (low, high): (f64, f64), eta: f64, rng: &mut ChaCha8Rng) -> (f64, f64) {
    if (x1 - x2).abs() <= 1e-14 {
        return (x1, x2);
    }
    let (y1, y2) = if x1 < x2 { (x1, x2) } else { (x2, x1) };
    let u = rng.gen::<f64>();

    let beta_q = |beta: f64| {
        let alpha = 2.0 - beta.powf(-(eta + 1.0));
        if u <= 1.0 / alpha {
            (u * alpha).powf(1.0 / (eta + 1.0))
        } else {
            (1.0 / (2.0 - u * alpha)).powf(1.0 / (eta + 1.0))
        }
    };

    let c1 = 0.5 * ((y1 + y2) - beta_q(1.0 + 2.0 * (y1 - low) / (y2 - y1)) * (y2 - y1));
    let c2 = 0.5 * ((y1 + y2) + beta_q(1.0 + 2.0 * (high - y2) / (y2 - y1)) * (y2 - y1));
    let (c1, c2) = (c1.clamp(low, high), c2.clamp(low, high));

    if rng.gen_bool(0.5) {
        (c2, c1)
    } else {
        (c1, c2)
    }
}

/// Bounded polynomial mutation of one real value
pub fn polynomial_mutation(y: f64, (low, high): (f64, f64), eta: f64, rng: &mut ChaCha8Rng) -> f64 {
    let delta = high - low;
    if delta <= 0.0 {
        return y;
    }
    let u = rng.gen::<f64>();
    let mut_pow = 1.0 / (eta + 1.0);
    let delta_q = if u < 0.5 {
        let xy = 1.0 - (y - low) / delta;
        let val = 2.0 * u + (1.0 - 2.0 * u) * xy.powf(eta + 1.0);
        val.powf(mut_pow) - 1.0
    } else {
        let xy = 1.0 - (high - y) / delta;
        let val = 2.0 * (1.0 - u) + 2.0 * (u - 0.5) * xy.powf(eta + 1.0);
        1.0 - val.powf(mut_pow)
    };
    (y + delta_q * delta).clamp(low, high)
}

/// Exchange the segments delimited by `points` random cut points
pub fn point_crossover(a: &mut [bool], b: &mut [bool], points: usize, rng: &mut ChaCha8Rng) {
    let n = a.len();
    if n < 2 {
        return;
    }
    let mut cuts: Vec<usize> = rand::seq::index::sample(rng, n - 1, points.min(n - 1))
        .into_iter()
        .map(|c| c + 1)
        .collect();
    cuts.sort_unstable();
    cuts.push(n);

    let mut swap = false;
    let mut start = 0;
    for cut in cuts {
        if swap {
            for i in start..cut {
                std::mem::swap(&mut a[i], &mut b[i]);
            }
        }
        swap = !swap;
        start = cut;
    }
}

/// Exchange each bit with probability 1/2
pub fn uniform_crossover(a: &mut [bool], b: &mut [bool], rng: &mut ChaCha8Rng) {
    for i in 0..a.len() {
        if rng.gen_bool(0.5) {
            std::mem::swap(&mut a[i], &mut b[i]);
        }
    }
}

/// Flip each bit with probability 1/n
pub fn bitflip(bits: &mut [bool], rng: &mut ChaCha8Rng) {
    if bits.is_empty() {
        return;
    }
    let prob = 1.0 / bits.len() as f64;
    for bit in bits.iter_mut() {
        if rng.gen::<f64>() < prob {
            *bit = !*bit;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::Param;
    use crate::problem::{Bounds, Evaluation};
    use std::sync::atomic::AtomicUsize;

    /// Two conflicting objectives on the bits, feasible when exactly `k` bits are set
    struct ToyProblem {
        n_features: usize,
        k: usize,
        calls: AtomicUsize,
    }

    impl ToyProblem {
        fn new(n_features: usize, k: usize) -> ToyProblem {
            ToyProblem { n_features, k, calls: AtomicUsize::new(0) }
        }
    }

    impl MultiObjectiveProblem for ToyProblem {
        fn n_features(&self) -> usize {
            self.n_features
        }
        fn n_objectives(&self) -> usize {
            2
        }
        fn bounds(&self) -> Bounds {
            Bounds { c: (0.1, 10.0), gamma: (0.01, 1.0) }
        }
        fn evaluate(&self, decision: &Decision) -> Evaluation {
            self.calls.fetch_add(1, Ordering::Relaxed);
            let first_half = decision.feature_mask[..self.n_features / 2].iter().filter(|&&b| b).count() as f64;
            let gap = decision.k() as f64 - self.k as f64;
            Evaluation {
                objectives: vec![-first_half - decision.c / 100.0, first_half - decision.gamma],
                constraint_violation: gap * gap,
            }
        }
    }

    fn nsga2(p_size: usize, n_eval: usize) -> Nsga2 {
        let mut param = Param::default();
        param.optimizer.p_size = p_size;
        param.optimizer.n_eval = n_eval;
        Nsga2::new(&param.optimizer, 1)
    }

    #[test]
    fn test_solve_returns_feasible_non_dominated_decisions_within_budget() {
        let problem = ToyProblem::new(6, 3);
        let pareto = nsga2(20, 200).solve(&problem).unwrap();
        assert!(!pareto.is_empty());
        assert!(pareto.len() <= 20);
        assert!(pareto.evaluations <= 200);
        assert_eq!(pareto.evaluations, problem.calls.load(Ordering::Relaxed));
        assert_eq!(pareto.solutions.len(), pareto.objectives.len());
        for decision in &pareto.solutions {
            assert_eq!(decision.k(), 3);
            assert!((0.1..=10.0).contains(&decision.c));
            assert!((0.01..=1.0).contains(&decision.gamma));
        }
        for a in &pareto.objectives {
            for b in &pareto.objectives {
                let dominates = a.iter().zip(b).all(|(x, y)| x <= y) && a.iter().zip(b).any(|(x, y)| x < y);
                assert!(!dominates, "{:?} dominates {:?} in the returned front", a, b);
            }
        }
    }

    #[test]
    fn test_solve_never_returns_duplicate_decisions() {
        // 4 bits with 2 set: few distinct masks, so clones are bred often
        let pareto = nsga2(10, 80).solve(&ToyProblem::new(4, 2)).unwrap();
        let hashes: HashSet<u64> = pareto
            .solutions
            .iter()
            .map(|d| Individual::new(d.clone()).hash)
            .collect();
        assert_eq!(hashes.len(), pareto.len());
    }

    #[test]
    fn test_solve_is_deterministic_for_a_seed() {
        let a = nsga2(10, 50).solve(&ToyProblem::new(4, 2)).unwrap();
        let b = nsga2(10, 50).solve(&ToyProblem::new(4, 2)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_parallel_evaluation_matches_sequential() {
        let sequential = nsga2(10, 60).solve(&ToyProblem::new(4, 2)).unwrap();
        let mut parallel = nsga2(10, 60);
        parallel.thread_number = 4;
        assert_eq!(parallel.solve(&ToyProblem::new(4, 2)).unwrap(), sequential);
    }

    #[test]
    fn test_solve_without_feasible_region_fails() {
        // more selected bits required than there are features
        let problem = ToyProblem::new(3, 10);
        assert!(matches!(
            nsga2(10, 30).solve(&problem),
            Err(SolverError::NoFeasibleSolution { evaluations: 30 })
        ));
    }

    #[test]
    fn test_cleared_flag_interrupts_search() {
        let running = Arc::new(AtomicBool::new(false));
        let optimizer = nsga2(10, 50).with_stop_flag(running);
        assert!(matches!(optimizer.solve(&ToyProblem::new(4, 2)), Err(SolverError::Interrupted { .. })));
    }

    #[test]
    fn test_elapsed_time_limit_times_out() {
        let mut optimizer = nsga2(10, 1_000_000);
        optimizer.time_limit_secs = 1e-9;
        assert!(matches!(optimizer.solve(&ToyProblem::new(4, 2)), Err(SolverError::Timeout { .. })));
    }

    #[test]
    fn test_sbx_and_polynomial_mutation_stay_in_bounds() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        for _ in 0..500 {
            let (c1, c2) = sbx(0.2, 9.5, (0.1, 10.0), 5.0, &mut rng);
            assert!((0.1..=10.0).contains(&c1) && (0.1..=10.0).contains(&c2));
            let m = polynomial_mutation(9.99, (0.1, 10.0), 5.0, &mut rng);
            assert!((0.1..=10.0).contains(&m));
        }
        assert_eq!(sbx(1.0, 1.0, (0.1, 10.0), 5.0, &mut rng), (1.0, 1.0));
    }

    #[test]
    fn test_point_crossover_preserves_bit_counts_per_position() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for points in [1, 2] {
            let mut a = vec![true; 8];
            let mut b = vec![false; 8];
            point_crossover(&mut a, &mut b, points, &mut rng);
            for i in 0..8 {
                assert_ne!(a[i], b[i]);
            }
            let switches = a.windows(2).filter(|w| w[0] != w[1]).count();
            assert!(switches <= points);
        }
    }

    #[test]
    fn test_bitflip_flips_about_one_bit() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut total = 0;
        for _ in 0..1000 {
            let mut bits = vec![false; 10];
            bitflip(&mut bits, &mut rng);
            total += bits.iter().filter(|&&b| b).count();
        }
        assert!((700..1300).contains(&total));
    }
}
