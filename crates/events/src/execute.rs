use storefront_core::Aggregate;

/// Decide and apply a command in place (no store, no bus).
///
/// Handy in tests and for rehydrating a scratch copy of an aggregate. The
/// persisted path goes through the infra `CommandDispatcher`.
pub fn execute<A>(aggregate: &mut A, command: &A::Command) -> Result<Vec<A::Event>, A::Error>
where
    A: Aggregate,
{
    let events = aggregate.handle(command)?;
    for ev in &events {
        aggregate.apply(ev);
    }
    Ok(events)
}
