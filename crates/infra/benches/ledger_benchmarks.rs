use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use std::sync::Arc;

use chrono::Utc;
use tokio::runtime::Runtime;

use boardstock_bom::{
    BomRequirement, ComponentSnapshot, Substitutions, resolve_requirements,
};
use boardstock_catalog::{NewBomLine, NewComponent, NewPcb};
use boardstock_core::{ComponentId, PcbId, UserId};
use boardstock_infra::{InMemoryStockStore, ProductionRecorder, StockStore};
use boardstock_production::ProductionRequest;

fn snapshot(i: usize, stock: i64) -> ComponentSnapshot {
    ComponentSnapshot {
        id: ComponentId::new(),
        name: format!("component {i}"),
        part_number: format!("PN-{i}"),
        current_stock: stock,
    }
}

/// Pure resolution cost across BOM sizes.
fn bench_resolver(c: &mut Criterion) {
    let mut group = c.benchmark_group("bom_resolution");

    for line_count in [1usize, 8, 64] {
        let lines: Vec<BomRequirement> = (0..line_count)
            .map(|i| BomRequirement {
                quantity_per_unit: 3,
                primary: snapshot(i, 1_000_000),
                alternative: None,
            })
            .collect();

        group.throughput(Throughput::Elements(line_count as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(line_count),
            &lines,
            |b, lines| {
                b.iter(|| {
                    let resolution =
                        resolve_requirements(black_box(lines), 10, &Substitutions::none())
                            .unwrap();
                    black_box(resolution)
                });
            },
        );
    }

    group.finish();
}

/// Full produce path (lock, resolve, deduct, record, outbox) on the
/// in-memory store.
fn bench_produce(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();

    let mut group = c.benchmark_group("produce");

    for line_count in [1usize, 8] {
        let (store, pcb_id) = rt.block_on(async {
            let store = Arc::new(InMemoryStockStore::new());
            let mut lines = Vec::new();
            for i in 0..line_count {
                let component = store
                    .insert_component(
                        NewComponent {
                            name: format!("component {i}"),
                            part_number: format!("PN-{i}"),
                            current_stock: i64::MAX / 4,
                            monthly_required_quantity: 0,
                        }
                        .into_component(Utc::now())
                        .unwrap(),
                    )
                    .await
                    .unwrap();
                lines.push(NewBomLine {
                    component_id: component.id,
                    quantity_per_unit: 1,
                    alternative_component_id: None,
                });
            }
            let pcb = store
                .insert_pcb(
                    NewPcb {
                        name: "bench board".to_string(),
                        code: format!("BENCH-{line_count}"),
                        description: None,
                    }
                    .into_pcb(Utc::now())
                    .unwrap(),
                )
                .await
                .unwrap();
            store.replace_bom_lines(pcb.id, lines).await.unwrap();
            (store, pcb.id)
        });

        let recorder = ProductionRecorder::new(store);
        let actor = UserId::new();

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(
            BenchmarkId::from_parameter(line_count),
            &pcb_id,
            |b, &pcb_id: &PcbId| {
                b.iter(|| {
                    rt.block_on(async {
                        recorder
                            .produce(ProductionRequest {
                                pcb_id,
                                quantity_produced: 1,
                                substitutions: Substitutions::none(),
                                produced_by: actor,
                            })
                            .await
                            .unwrap()
                    })
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_resolver, bench_produce);
criterion_main!(benches);
