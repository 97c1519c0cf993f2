//! A sample election procedure: three authorities run the key ceremony on their own threads,
//! voters cast proven ballots, and the authorities jointly decrypt the tally

use adder_tally::{
    rng::SharedRng, CeremonyConfig, Election, KeyCeremony, ModInt, PartialDecryption, VoteProof,
};
use crypto_bigint::rand_core::{OsRng, RngCore};
use std::thread;

const KEY_BITS: usize = 64;
const AUTHORITIES: [&str; 3] = ["alpha", "beta", "gamma"];
const DECRYPTION_THRESHOLD: usize = 2;
const CANDIDATES: [&str; 3] = ["red", "green", "blue"];
const VOTERS: usize = 10;

fn main() {
    let config = CeremonyConfig::new(
        AUTHORITIES.len(),
        DECRYPTION_THRESHOLD,
        AUTHORITIES.len(),
        KEY_BITS,
    )
    .unwrap();
    let rng = SharedRng::from_entropy();
    let ceremony = KeyCeremony::new(&mut rng.clone(), config).unwrap();

    // Each authority joins, then deals its polynomial once everyone has joined
    thread::scope(|scope| {
        for auth in AUTHORITIES {
            let mut rng = rng.clone();
            let ceremony = &ceremony;
            scope.spawn(move || ceremony.generate_key_share(&mut rng, auth).unwrap());
        }
    });
    thread::scope(|scope| {
        for auth in AUTHORITIES {
            let mut rng = rng.clone();
            let ceremony = &ceremony;
            scope.spawn(move || ceremony.distribute_polynomial(&mut rng, auth).unwrap());
        }
    });
    let shares: Vec<_> = AUTHORITIES
        .iter()
        .map(|auth| ceremony.reconstruct_private_share(auth).unwrap())
        .collect();
    let public_key = ceremony.assemble_public_key().unwrap();

    // Cast the ballots, keeping the true tally for verification later
    let choices: Vec<String> = CANDIDATES.iter().map(|c| c.to_string()).collect();
    let mut election = Election::new(public_key, choices.clone());
    let mut true_tally = vec![0u64; CANDIDATES.len()];
    for _ in 0..VOTERS {
        let pick = (OsRng.next_u32() as usize) % CANDIDATES.len();
        let selections: Vec<ModInt> = (0..CANDIDATES.len())
            .map(|i| if i == pick { ModInt::ONE } else { ModInt::ZERO })
            .collect();
        let vote = public_key
            .encrypt_vote(&mut OsRng, &selections, &choices)
            .unwrap();
        let proof = VoteProof::compute(&mut OsRng, &vote, &public_key, &selections, 1, 1).unwrap();
        let vote = vote.with_proof(proof);
        if !vote.verify_proof(&public_key, 1, 1) {
            panic!("Ballot validity cannot be verified");
        }
        election.cast_vote(vote).unwrap();
        true_tally[pick] += 1;
    }

    // Tally the ballots; only a threshold of authorities takes part in decryption
    let sum = election.sum_votes(&mut OsRng).unwrap();
    if !sum
        .get_proof()
        .unwrap()
        .verify_sum(&sum, &public_key, VOTERS as u64)
    {
        panic!("The tally's sum proof failed to be verified");
    }
    let partials: Vec<PartialDecryption> = AUTHORITIES
        .iter()
        .zip(&shares)
        .skip(1)
        .map(|(auth, share)| {
            PartialDecryption::new(
                ceremony.index_of(auth).unwrap(),
                share.partial_decrypt_vote(&sum),
            )
        })
        .collect();
    let combined = election.combine_partial_decryptions(&partials).unwrap();
    let totals = election
        .resolve_final_sum(&combined, &sum, &public_key)
        .unwrap();
    if totals != true_tally {
        panic!("the final tally is incorrect!");
    }
    for (candidate, total) in CANDIDATES.iter().zip(&totals) {
        println!("{candidate}: {total}");
    }
    println!("The election is a success!");
}
