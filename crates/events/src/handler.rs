/// Execute an aggregate command in place: decide, then apply every event.
///
/// No persistence and no publication; the infrastructure dispatcher does that.
/// Mostly useful in tests and for inline processing.
pub fn execute<A>(aggregate: &mut A, command: &A::Command) -> Result<Vec<A::Event>, A::Error>
where
    A: storebridge_core::Aggregate,
{
    let events = A::handle(aggregate, command)?;
    for ev in &events {
        A::apply(aggregate, ev);
    }
    Ok(events)
}
