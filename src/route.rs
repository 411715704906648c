//! Routes through the network and the navigators that follow them.

pub use generator::{
    FixedRouteGenerator, OdRouteGenerator, ProbabilisticRouteGenerator, RouteGenerator,
};
pub use suitability::{lane_drop, suitability, GET_OFF_THIS_LANE_NOW, NO_LANE_CHANGE_NEEDED};

use crate::error::NetworkError;
use crate::network::Network;
use crate::{GtuTypeId, LinkId, NodeId};
use std::rc::Rc;

mod generator;
mod suitability;

/// An ordered sequence of nodes from an origin to a destination.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Route {
    nodes: Vec<NodeId>,
}

impl Route {
    /// Creates a route through the given nodes.
    pub fn new(nodes: Vec<NodeId>) -> Result<Self, NetworkError> {
        if nodes.is_empty() {
            return Err(NetworkError::EmptyRoute);
        }
        Ok(Self { nodes })
    }

    /// Finds the fastest route between two nodes for a GTU type,
    /// using the free flow travel time of each link.
    pub fn shortest(
        network: &Network,
        from: NodeId,
        to: NodeId,
        gtu_type: GtuTypeId,
    ) -> Result<Self, NetworkError> {
        let result = pathfinding::directed::dijkstra::dijkstra(
            &from,
            |node| successors(network, *node, gtu_type),
            |node| *node == to,
        );
        match result {
            Some((nodes, _)) => Self::new(nodes),
            None => Err(NetworkError::NoRoute { from, to }),
        }
    }

    /// The nodes of the route, from origin to destination.
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn origin(&self) -> NodeId {
        self.nodes[0]
    }

    pub fn destination(&self) -> NodeId {
        self.nodes[self.nodes.len() - 1]
    }

    /// The number of nodes in the route.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Finds the first occurrence of a node at or after index `from`.
    pub fn index_of(&self, node: NodeId, from: usize) -> Option<usize> {
        self.nodes
            .iter()
            .skip(from)
            .position(|n| *n == node)
            .map(|idx| idx + from)
    }
}

/// The links leaving a node, weighted by their travel time in tenths of a second.
fn successors(
    network: &Network,
    node: NodeId,
    gtu_type: GtuTypeId,
) -> impl Iterator<Item = (NodeId, usize)> + '_ {
    network.links_out(node).iter().filter_map(move |link_id| {
        let link = network.link(*link_id);
        let speed = network
            .compatible_lanes(*link_id, gtu_type)
            .iter()
            .map(|lane| network.lane(*lane).speed_limit())
            .reduce(f64::max)?;
        let cost = (10. * link.length() / speed) as _;
        Some((link.end(), cost))
    })
}

/// Follows a [Route] on behalf of a single GTU.
///
/// The navigator keeps a cursor on the last visited node. While a GTU drives on a link,
/// the last visited node is the start of that link and the next node to visit is its end.
#[derive(Clone, Debug)]
pub struct RouteNavigator {
    route: Rc<Route>,
    last_visited: usize,
}

impl RouteNavigator {
    /// Creates a navigator positioned at the origin of the route.
    pub fn new(route: Rc<Route>) -> Self {
        Self {
            route,
            last_visited: 0,
        }
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    /// The index of the last visited node in the route.
    pub fn last_visited_index(&self) -> usize {
        self.last_visited
    }

    pub fn last_visited_node(&self) -> NodeId {
        self.route.nodes[self.last_visited]
    }

    /// The next node on the route, or `None` once the destination was visited.
    pub fn next_node_to_visit(&self) -> Option<NodeId> {
        self.route.nodes.get(self.last_visited + 1).copied()
    }

    pub fn destination(&self) -> NodeId {
        self.route.destination()
    }

    /// Advances the cursor by one node.
    pub fn visit_next_node(&mut self) -> Result<NodeId, NetworkError> {
        let node = self
            .next_node_to_visit()
            .ok_or(NetworkError::RouteCompleted)?;
        self.last_visited += 1;
        Ok(node)
    }

    /// Determines which link continues the route after `link`.
    ///
    /// The end node of `link` must be on the remaining route and must not be the destination.
    /// Exactly one link leaving that node, with lanes usable by the GTU type,
    /// may lead to the route node after it.
    pub fn next_link(
        &self,
        network: &Network,
        link: LinkId,
        gtu_type: GtuTypeId,
    ) -> Result<LinkId, NetworkError> {
        let node = network.link(link).end();
        let idx = self
            .route
            .index_of(node, self.last_visited + 1)
            .ok_or(NetworkError::NotOnRoute { node })?;
        self.link_towards(network, link, idx, gtu_type)
    }

    /// Like [RouteNavigator::next_link], with the end node of `link` known to be the route
    /// node at index `idx`. Routes that pass a node more than once need the index.
    pub(crate) fn link_towards(
        &self,
        network: &Network,
        link: LinkId,
        idx: usize,
        gtu_type: GtuTypeId,
    ) -> Result<LinkId, NetworkError> {
        let node = network.link(link).end();
        let next = *self
            .route
            .nodes
            .get(idx + 1)
            .ok_or(NetworkError::NoContinuation { link })?;

        let mut candidates = network.links_out(node).iter().copied().filter(|id| {
            network.link(*id).end() == next && network.compatible_lane_count(*id, gtu_type) > 0
        });
        match (candidates.next(), candidates.next()) {
            (Some(id), None) => Ok(id),
            (Some(_), Some(_)) => Err(NetworkError::AmbiguousRoute { node, next }),
            (None, _) => Err(NetworkError::NoContinuation { link }),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::network::{LaneAttributes, LinkType};

    /// a -> b, then b -> c and b -> d.
    fn fork() -> (Network, GtuTypeId, [NodeId; 4], [LinkId; 3]) {
        let mut net = Network::new();
        let car = net.add_gtu_type("car");
        let nodes = ["a", "b", "c", "d"].map(|name| net.add_node(name));
        let links = [(0, 1), (1, 2), (1, 3)].map(|(from, to)| {
            let link = net.add_link(nodes[from], nodes[to], LinkType::Ordinary);
            net.add_lane(link, &LaneAttributes::new(200.0, 25.0));
            link
        });
        (net, car, nodes, links)
    }

    #[test]
    fn navigator_cursor() {
        let (net, car, nodes, links) = fork();
        let route = Rc::new(Route::new(vec![nodes[0], nodes[1], nodes[3]]).unwrap());
        let mut nav = RouteNavigator::new(route);

        assert_eq!(nav.last_visited_node(), nodes[0]);
        assert_eq!(nav.next_node_to_visit(), Some(nodes[1]));
        assert_eq!(nav.next_link(&net, links[0], car), Ok(links[2]));

        assert_eq!(nav.visit_next_node(), Ok(nodes[1]));
        assert_eq!(nav.visit_next_node(), Ok(nodes[3]));
        assert_eq!(nav.next_node_to_visit(), None);
        assert_eq!(nav.visit_next_node(), Err(NetworkError::RouteCompleted));
        assert_eq!(nav.last_visited_index(), 2);
    }

    #[test]
    fn next_link_errors() {
        let (mut net, car, nodes, links) = fork();
        let route = Rc::new(Route::new(vec![nodes[0], nodes[1]]).unwrap());
        let nav = RouteNavigator::new(route);
        assert_eq!(
            nav.next_link(&net, links[0], car),
            Err(NetworkError::NoContinuation { link: links[0] })
        );
        assert_eq!(
            nav.next_link(&net, links[1], car),
            Err(NetworkError::NotOnRoute { node: nodes[2] })
        );

        let parallel = net.add_link(nodes[1], nodes[2], LinkType::Ordinary);
        net.add_lane(parallel, &LaneAttributes::new(150.0, 25.0));
        let route = Rc::new(Route::new(vec![nodes[0], nodes[1], nodes[2]]).unwrap());
        let nav = RouteNavigator::new(route);
        assert_eq!(
            nav.next_link(&net, links[0], car),
            Err(NetworkError::AmbiguousRoute {
                node: nodes[1],
                next: nodes[2]
            })
        );
    }

    #[test]
    fn shortest_route() {
        let (mut net, car, nodes, _) = fork();
        let e = net.add_node("e");
        let slow = net.add_link(nodes[2], e, LinkType::Ordinary);
        net.add_lane(slow, &LaneAttributes::new(1000.0, 5.0));
        let fast = net.add_link(nodes[3], e, LinkType::Ordinary);
        net.add_lane(fast, &LaneAttributes::new(1000.0, 30.0));

        let route = Route::shortest(&net, nodes[0], e, car).unwrap();
        assert_eq!(route.nodes(), &[nodes[0], nodes[1], nodes[3], e]);
        assert_eq!(
            Route::shortest(&net, e, nodes[0], car),
            Err(NetworkError::NoRoute {
                from: e,
                to: nodes[0]
            })
        );
        assert_eq!(Route::new(vec![]), Err(NetworkError::EmptyRoute));
    }

    #[test]
    fn next_link_on_a_route_through_a_node_twice() {
        let (mut net, car, nodes, links) = fork();
        let back = net.add_link(nodes[2], nodes[0], LinkType::Ordinary);
        net.add_lane(back, &LaneAttributes::new(200.0, 25.0));
        let [a, b, c, d] = nodes;
        let route = Rc::new(Route::new(vec![a, b, c, a, b, d]).unwrap());
        let mut nav = RouteNavigator::new(route);

        assert_eq!(nav.next_link(&net, links[0], car), Ok(links[1]));
        assert_eq!(nav.link_towards(&net, links[0], 4, car), Ok(links[2]));
        for _ in 0..3 {
            nav.visit_next_node().unwrap();
        }
        assert_eq!(nav.next_link(&net, links[0], car), Ok(links[2]));
    }
}
