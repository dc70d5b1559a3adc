use std::cmp::Ordering;

use strata_domain::{Tier, routing::LoadBalancing};

/// Load signals for one candidate tier.
#[derive(Clone, Debug)]
pub struct TierLoad {
	pub tier: Tier,
	pub response_time_ms: f64,
	/// Operations routed to the tier so far.
	pub routed: u64,
	pub in_flight: u32,
	pub weight: f32,
}

/// Orders candidates least-loaded first. Heavier weights win ties, then tier order.
pub fn order(mode: LoadBalancing, loads: &mut [TierLoad]) {
	loads.sort_by(|a, b| {
		primary(mode, a, b)
			.then_with(|| b.weight.total_cmp(&a.weight))
			.then_with(|| a.tier.cmp(&b.tier))
	});
}

fn primary(mode: LoadBalancing, a: &TierLoad, b: &TierLoad) -> Ordering {
	match mode {
		LoadBalancing::ResponseTime => a.response_time_ms.total_cmp(&b.response_time_ms),
		LoadBalancing::Capacity => capacity_usage(a).total_cmp(&capacity_usage(b)),
		LoadBalancing::Connections => a.in_flight.cmp(&b.in_flight),
	}
}

/// Routed operations per unit of weight; a heavier tier absorbs proportionally more traffic.
fn capacity_usage(load: &TierLoad) -> f64 {
	load.routed as f64 / f64::from(load.weight.max(f32::EPSILON))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn load(tier: Tier, response_time_ms: f64, routed: u64, in_flight: u32) -> TierLoad {
		TierLoad { tier, response_time_ms, routed, in_flight, weight: 1.0 }
	}

	fn tiers(loads: &[TierLoad]) -> Vec<Tier> {
		loads.iter().map(|load| load.tier).collect()
	}

	#[test]
	fn each_mode_sorts_by_its_own_signal() {
		let base = vec![
			load(Tier::FastCache, 30.0, 1, 4),
			load(Tier::DurablePersistent, 10.0, 9, 0),
			load(Tier::SemanticVector, 20.0, 5, 2),
		];
		let mut by_latency = base.clone();
		let mut by_capacity = base.clone();
		let mut by_connections = base;

		order(LoadBalancing::ResponseTime, &mut by_latency);
		order(LoadBalancing::Capacity, &mut by_capacity);
		order(LoadBalancing::Connections, &mut by_connections);

		assert_eq!(
			tiers(&by_latency),
			vec![Tier::DurablePersistent, Tier::SemanticVector, Tier::FastCache]
		);
		assert_eq!(
			tiers(&by_capacity),
			vec![Tier::FastCache, Tier::SemanticVector, Tier::DurablePersistent]
		);
		assert_eq!(
			tiers(&by_connections),
			vec![Tier::DurablePersistent, Tier::SemanticVector, Tier::FastCache]
		);
	}

	#[test]
	fn capacity_scales_usage_by_weight() {
		let mut loads = vec![
			load(Tier::FastCache, 5.0, 4, 0),
			TierLoad { weight: 3.0, ..load(Tier::DurablePersistent, 5.0, 9, 0) },
		];

		order(LoadBalancing::Capacity, &mut loads);

		assert_eq!(tiers(&loads), vec![Tier::DurablePersistent, Tier::FastCache]);
	}

	#[test]
	fn weight_breaks_ties() {
		let mut loads = vec![
			load(Tier::FastCache, 5.0, 0, 0),
			TierLoad { weight: 2.0, ..load(Tier::DurablePersistent, 5.0, 0, 0) },
		];

		order(LoadBalancing::ResponseTime, &mut loads);

		assert_eq!(tiers(&loads), vec![Tier::DurablePersistent, Tier::FastCache]);
	}
}
