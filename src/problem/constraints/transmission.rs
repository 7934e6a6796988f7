//! Corridor flow caps and the offshore converter bottleneck.
use super::ConstraintKey;
use crate::problem::variables::{offshore_hubs, Carrier, VarKey};
use crate::problem::{BuildContext, ProblemBuilder};
use anyhow::Result;
use itertools::iproduct;

pub fn add_all(builder: &mut ProblemBuilder, ctx: &BuildContext) -> Result<()> {
    let model = ctx.model;
    for (&period, &scenario) in iproduct!(&model.temporal.periods, &model.temporal.scenarios) {
        for hour in model.temporal.hours() {
            // both directions of a corridor share the installed capacity
            for (arc, from, to) in model.topology.directed_flows() {
                builder.add_le(
                    ConstraintKey::FlowCap {
                        carrier: Carrier::Electricity,
                        from: from.clone(),
                        to: to.clone(),
                        period,
                        scenario,
                        hour,
                    },
                    0.0,
                    &[
                        (
                            VarKey::Flow {
                                carrier: Carrier::Electricity,
                                from: from.clone(),
                                to: to.clone(),
                                period,
                                scenario,
                                hour,
                            },
                            1.0,
                        ),
                        (
                            VarKey::TransInstalled {
                                from: arc.from.clone(),
                                to: arc.to.clone(),
                                period,
                            },
                            -1.0,
                        ),
                    ],
                )?;
            }

            // everything entering or leaving a hub passes its converter
            for node in offshore_hubs(ctx) {
                let mut terms = Vec::new();
                for arc in model.topology.arcs.iter().filter(|a| a.touches(&node.id)) {
                    let other = arc.other_end(&node.id).clone();
                    for (from, to) in [(node.id.clone(), other.clone()), (other, node.id.clone())]
                    {
                        terms.push((
                            VarKey::Flow {
                                carrier: Carrier::Electricity,
                                from,
                                to,
                                period,
                                scenario,
                                hour,
                            },
                            1.0,
                        ));
                    }
                }
                terms.push((
                    VarKey::OffshoreConverterInstalled {
                        node: node.id.clone(),
                        period,
                    },
                    -1.0,
                ));
                builder.add_le(
                    ConstraintKey::OffshoreConverterCap {
                        node: node.id.clone(),
                        period,
                        scenario,
                        hour,
                    },
                    0.0,
                    &terms,
                )?;
            }
        }
    }
    Ok(())
}
