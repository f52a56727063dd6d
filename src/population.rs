use crate::individual::Individual;
use std::cmp::Ordering;
use std::fmt;
use std::mem;

pub struct Population {
    pub individuals: Vec<Individual>,
}

impl Population {
    pub fn new() -> Population {
        Population { individuals: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }

    pub fn add(&mut self, population: Population) {
        self.individuals.extend(population.individuals);
    }

    /// Keep `n` individuals: feasible ones first, by non-domination rank then decreasing
    /// crowding distance, infeasible ones after, by increasing constraint violation.
    /// Ranks and crowding distances are refreshed on the survivors.
    pub fn survive(&mut self, n: usize) {
        let (feasible, mut infeasible): (Vec<usize>, Vec<usize>) =
            (0..self.individuals.len()).partition(|&i| self.individuals[i].is_feasible());

        let fronts = fast_non_dominated_sort(&mut self.individuals, &feasible);
        let mut selected: Vec<usize> = Vec::with_capacity(n);

        for front in &fronts {
            if selected.len() >= n {
                break;
            }
            crowding_distance_assignment(&mut self.individuals, front);
            if selected.len() + front.len() <= n {
                selected.extend_from_slice(front);
            } else {
                let mut by_crowding = front.clone();
                by_crowding.sort_by(|&a, &b| {
                    self.individuals[b]
                        .crowding_distance
                        .partial_cmp(&self.individuals[a].crowding_distance)
                        .unwrap_or(Ordering::Equal)
                });
                let remaining = n - selected.len();
                selected.extend(by_crowding.into_iter().take(remaining));
            }
        }

        if selected.len() < n {
            infeasible.sort_by(|&a, &b| {
                self.individuals[a]
                    .constraint_violation
                    .partial_cmp(&self.individuals[b].constraint_violation)
                    .unwrap_or(Ordering::Equal)
            });
            for &i in &infeasible {
                self.individuals[i].rank = usize::MAX;
                self.individuals[i].crowding_distance = 0.0;
            }
            let remaining = n - selected.len();
            selected.extend(infeasible.into_iter().take(remaining));
        }

        let mut pool: Vec<Option<Individual>> = mem::take(&mut self.individuals).into_iter().map(Some).collect();
        self.individuals = selected.into_iter().filter_map(|i| pool[i].take()).collect();
    }

    /// Feasible individuals of the first front, in population order
    pub fn pareto_front(&self) -> Vec<&Individual> {
        self.individuals.iter().filter(|i| i.is_feasible() && i.rank == 0).collect()
    }
}

impl Default for Population {
    fn default() -> Self {
        Population::new()
    }
}

/// Fast non-dominated sorting restricted to `subset`. Fronts hold indices into `individuals`
/// and each member gets its rank.
pub fn fast_non_dominated_sort(individuals: &mut [Individual], subset: &[usize]) -> Vec<Vec<usize>> {
    let n = subset.len();
    let mut dominated_by: Vec<Vec<usize>> = vec![vec![]; n];
    let mut domination_count: Vec<usize> = vec![0; n];
    let mut fronts: Vec<Vec<usize>> = Vec::new();
    let mut current: Vec<usize> = Vec::new();

    for a in 0..n {
        for b in 0..n {
            if a == b {
                continue;
            }
            if individuals[subset[a]].dominates(&individuals[subset[b]]) {
                dominated_by[a].push(b);
            } else if individuals[subset[b]].dominates(&individuals[subset[a]]) {
                domination_count[a] += 1;
            }
        }
        if domination_count[a] == 0 {
            current.push(a);
        }
    }

    let mut rank = 0;
    while !current.is_empty() {
        let mut next = Vec::new();
        for &a in &current {
            individuals[subset[a]].rank = rank;
            for &b in &dominated_by[a] {
                domination_count[b] -= 1;
                if domination_count[b] == 0 {
                    next.push(b);
                }
            }
        }
        fronts.push(current.iter().map(|&a| subset[a]).collect());
        current = next;
        rank += 1;
    }

    fronts
}

/// Crowding distance within one front, boundary points being infinitely far
pub fn crowding_distance_assignment(individuals: &mut [Individual], front: &[usize]) {
    let n = front.len();
    if n == 0 {
        return;
    }
    for &i in front {
        individuals[i].crowding_distance = 0.0;
    }
    if n <= 2 {
        for &i in front {
            individuals[i].crowding_distance = f64::INFINITY;
        }
        return;
    }

    let n_objectives = individuals[front[0]].objectives.len();
    for m in 0..n_objectives {
        let mut sorted: Vec<usize> = front.to_vec();
        sorted.sort_by(|&a, &b| {
            individuals[a].objectives[m]
                .partial_cmp(&individuals[b].objectives[m])
                .unwrap_or(Ordering::Equal)
        });

        individuals[sorted[0]].crowding_distance = f64::INFINITY;
        individuals[sorted[n - 1]].crowding_distance = f64::INFINITY;

        let range = individuals[sorted[n - 1]].objectives[m] - individuals[sorted[0]].objectives[m];
        if range > 0.0 {
            for i in 1..n - 1 {
                let gap = individuals[sorted[i + 1]].objectives[m] - individuals[sorted[i - 1]].objectives[m];
                individuals[sorted[i]].crowding_distance += gap / range;
            }
        }
    }
}

impl fmt::Debug for Population {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, individual) in self.individuals.iter().enumerate() {
            writeln!(f, "#{} {:?}", i, individual)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn population(objectives: &[[f64; 2]]) -> Population {
        let mut population = Population::new();
        for (i, o) in objectives.iter().enumerate() {
            let mut individual = Individual::test_with_objectives(o.to_vec());
            individual.decision.c = 1.0 + i as f64;
            individual.compute_hash();
            population.individuals.push(individual);
        }
        population
    }

    #[test]
    fn test_fast_non_dominated_sort_builds_fronts_and_ranks() {
        let mut pop = population(&[[-1.0, -0.1], [-0.1, -1.0], [-0.5, -0.5], [-0.4, -0.4], [0.0, 0.0]]);
        let subset: Vec<usize> = (0..5).collect();
        let fronts = fast_non_dominated_sort(&mut pop.individuals, &subset);
        assert_eq!(fronts, vec![vec![0, 1, 2], vec![3], vec![4]]);
        assert_eq!(pop.individuals.iter().map(|i| i.rank).collect::<Vec<_>>(), vec![0, 0, 0, 1, 2]);
    }

    #[test]
    fn test_crowding_distance_favors_boundaries_and_isolated_points() {
        let mut pop = population(&[[-1.0, 0.0], [-0.9, -0.1], [-0.5, -0.5], [0.0, -1.0]]);
        crowding_distance_assignment(&mut pop.individuals, &[0, 1, 2, 3]);
        assert!(pop.individuals[0].crowding_distance.is_infinite());
        assert!(pop.individuals[3].crowding_distance.is_infinite());
        assert!((pop.individuals[1].crowding_distance - 1.0).abs() < 1e-12);
        assert!((pop.individuals[2].crowding_distance - 1.8).abs() < 1e-12);
    }

    #[test]
    fn test_survive_puts_feasible_before_infeasible() {
        let mut pop = population(&[[-1.0, -1.0], [0.0, 0.0], [-0.5, -0.5], [-0.9, -0.9]]);
        pop.individuals[0].constraint_violation = 4.0;
        pop.individuals[3].constraint_violation = 1.0;
        pop.survive(3);
        let cs: Vec<f64> = pop.individuals.iter().map(|i| i.decision.c).collect();
        // feasible #2 (rank 0) then feasible #1 (rank 1) then the least violating infeasible #3
        assert_eq!(cs, vec![3.0, 2.0, 4.0]);
        assert_eq!(pop.pareto_front().len(), 1);
    }

    #[test]
    fn test_survive_truncates_last_front_by_crowding() {
        let mut pop = population(&[[-1.0, 0.0], [-0.6, -0.4], [-0.5, -0.5], [0.0, -1.0]]);
        pop.survive(3);
        let cs: Vec<f64> = pop.individuals.iter().map(|i| i.decision.c).collect();
        assert_eq!(cs.len(), 3);
        // boundaries first, then the least crowded interior point
        assert_eq!(cs, vec![1.0, 4.0, 3.0]);
    }
}
