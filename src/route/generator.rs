use super::Route;
use crate::error::{NetworkError, SimError, SimResult};
use crate::network::Network;
use crate::{GtuTypeId, NodeId};
use rand::distributions::{Distribution, WeightedIndex};
use rand::RngCore;
use slotmap::SparseSecondaryMap;
use std::fmt::Debug;
use std::rc::Rc;

/// Produces a route for each newly generated GTU.
pub trait RouteGenerator: Debug {
    fn generate(
        &mut self,
        network: &Network,
        gtu_type: GtuTypeId,
        rng: &mut dyn RngCore,
    ) -> Result<Rc<Route>, NetworkError>;
}

/// Always produces the same route.
#[derive(Clone, Debug)]
pub struct FixedRouteGenerator {
    route: Rc<Route>,
}

impl FixedRouteGenerator {
    pub fn new(route: Route) -> Self {
        Self {
            route: Rc::new(route),
        }
    }
}

impl RouteGenerator for FixedRouteGenerator {
    fn generate(
        &mut self,
        _network: &Network,
        _gtu_type: GtuTypeId,
        _rng: &mut dyn RngCore,
    ) -> Result<Rc<Route>, NetworkError> {
        Ok(self.route.clone())
    }
}

/// Picks one of several routes at random, according to their weights.
#[derive(Clone, Debug)]
pub struct ProbabilisticRouteGenerator {
    routes: Vec<Rc<Route>>,
    weights: WeightedIndex<f64>,
}

impl ProbabilisticRouteGenerator {
    /// Creates a generator from `(route, weight)` pairs.
    /// At least one weight must be positive and none may be negative.
    pub fn new(routes: impl IntoIterator<Item = (Route, f64)>) -> SimResult<Self> {
        let (routes, weights): (Vec<_>, Vec<_>) = routes
            .into_iter()
            .map(|(route, weight)| (Rc::new(route), weight))
            .unzip();
        let weights =
            WeightedIndex::new(weights).map_err(|err| SimError::Config(err.to_string()))?;
        Ok(Self { routes, weights })
    }
}

impl RouteGenerator for ProbabilisticRouteGenerator {
    fn generate(
        &mut self,
        _network: &Network,
        _gtu_type: GtuTypeId,
        rng: &mut dyn RngCore,
    ) -> Result<Rc<Route>, NetworkError> {
        Ok(self.routes[self.weights.sample(rng)].clone())
    }
}

/// Draws a destination from an origin-destination distribution
/// and routes to it along the fastest path.
#[derive(Clone, Debug)]
pub struct OdRouteGenerator {
    origin: NodeId,
    destinations: Vec<NodeId>,
    weights: WeightedIndex<f64>,
    /// Shortest routes are computed once per destination.
    cache: SparseSecondaryMap<NodeId, Rc<Route>>,
}

impl OdRouteGenerator {
    /// Creates a generator from an origin and `(destination, demand)` pairs.
    pub fn new(
        origin: NodeId,
        destinations: impl IntoIterator<Item = (NodeId, f64)>,
    ) -> SimResult<Self> {
        let (destinations, weights): (Vec<_>, Vec<_>) = destinations.into_iter().unzip();
        let weights =
            WeightedIndex::new(weights).map_err(|err| SimError::Config(err.to_string()))?;
        Ok(Self {
            origin,
            destinations,
            weights,
            cache: SparseSecondaryMap::new(),
        })
    }
}

impl RouteGenerator for OdRouteGenerator {
    fn generate(
        &mut self,
        network: &Network,
        gtu_type: GtuTypeId,
        rng: &mut dyn RngCore,
    ) -> Result<Rc<Route>, NetworkError> {
        let destination = self.destinations[self.weights.sample(rng)];
        if let Some(route) = self.cache.get(destination) {
            return Ok(route.clone());
        }
        let route = Rc::new(Route::shortest(network, self.origin, destination, gtu_type)?);
        log::debug!(
            "Route from {:?} to {:?} has {} nodes",
            self.origin,
            destination,
            route.len()
        );
        self.cache.insert(destination, route.clone());
        Ok(route)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::network::{LaneAttributes, LinkType};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn weighted_choice() {
        let mut net = Network::new();
        let car = net.add_gtu_type("car");
        let a = net.add_node("a");
        let b = net.add_node("b");
        let c = net.add_node("c");
        for to in [b, c] {
            let link = net.add_link(a, to, LinkType::Ordinary);
            net.add_lane(link, &LaneAttributes::new(100.0, 20.0));
        }

        let mut rng = StdRng::seed_from_u64(7);
        let mut od = OdRouteGenerator::new(a, [(b, 1.0), (c, 0.0)]).unwrap();
        for _ in 0..10 {
            let route = od.generate(&net, car, &mut rng).unwrap();
            assert_eq!(route.nodes(), &[a, b]);
        }

        let mut gen = ProbabilisticRouteGenerator::new([
            (Route::new(vec![a, b]).unwrap(), 0.0),
            (Route::new(vec![a, c]).unwrap(), 3.0),
        ])
        .unwrap();
        assert_eq!(gen.generate(&net, car, &mut rng).unwrap().destination(), c);

        assert!(matches!(
            ProbabilisticRouteGenerator::new([(Route::new(vec![a]).unwrap(), -1.0)]),
            Err(SimError::Config(_))
        ));
    }
}
