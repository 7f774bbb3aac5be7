use relativity::{BiMultiMap, Graph, MaintenancePolicy, RelationConfig};

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    println!("Relativity v{}", relativity::version());
    println!("==========================================");
    println!();

    // Demo 1: Bidirectional relation
    demo_bimap()?;

    // Demo 2: Graph of relations
    demo_graph()?;

    // Demo 3: Incremental join index
    demo_index()?;

    Ok(())
}

fn demo_bimap() -> anyhow::Result<()> {
    println!("=== Demo 1: BiMultiMap ===");
    let enrolled = BiMultiMap::from_pairs([
        ("alice", "math"),
        ("alice", "english"),
        ("bob", "english"),
    ]);
    println!("✓ alice takes {:?}", enrolled.get(&"alice"));
    println!("✓ english is taken by {:?}", enrolled.get_inverse(&"english"));

    enrolled.remove(&"alice", &"math")?;
    println!("✓ Removed alice -> math, alice now takes {:?}", enrolled.get(&"alice"));

    let by_class = enrolled.inverse();
    by_class.add("art", "carol");
    println!("✓ Added carol through the inverse: {:?}", enrolled);
    Ok(())
}

fn demo_graph() -> anyhow::Result<()> {
    println!("\n=== Demo 2: Graph ===");
    let graph = Graph::new([("student", "class"), ("class", "teacher")])?;
    graph.add([("student", "alice"), ("class", "math"), ("teacher", "smith")])?;
    graph.add([("student", "bob"), ("class", "math")])?;
    graph.add([("student", "bob"), ("class", "art"), ("teacher", "jones")])?;
    println!("✓ Columns: {:?}", graph.columns());

    let chain = graph.path(["student", "class", "teacher"])?;
    for row in chain.rows() {
        println!("  {}", row.join(" -> "));
    }

    let star = graph.star("class", ["student", "teacher"])?;
    for row in star.rows() {
        println!("  {} has {:?}", row.key, row.values);
    }

    graph.remove("class", &"math")?;
    println!("✓ Removed math everywhere, classes left: {:?}", graph.column("class")?);
    Ok(())
}

fn demo_index() -> anyhow::Result<()> {
    println!("\n=== Demo 3: Join Index ===");
    let config = RelationConfig {
        index_policy: MaintenancePolicy::Incremental,
        ..RelationConfig::default()
    };
    let graph = Graph::with_config(config, [("student", "class"), ("class", "room")])?;
    let rooms = graph.pairs("student", "room");

    graph.add([("student", "alice"), ("class", "math"), ("room", "r1")])?;
    graph.add([("student", "alice"), ("class", "physics"), ("room", "r1")])?;
    println!(
        "✓ alice -> r1 backed by {} threads",
        rooms.witnesses(&"alice", &"r1")
    );

    graph.remove("class", &"math")?;
    println!(
        "✓ After dropping math: alice in r1 = {} ({} thread)",
        rooms.contains(&"alice", &"r1"),
        rooms.witnesses(&"alice", &"r1")
    );

    graph.remove("class", &"physics")?;
    println!("✓ After dropping physics: alice in r1 = {}", rooms.contains(&"alice", &"r1"));
    Ok(())
}
