//! Admin operations and guarded wallet creation

use multisig_engine::crypto::{ExternalKeyPair, KeyPair, NativeAddress, WalletId};
use multisig_engine::height::ManualHeight;
use multisig_engine::multisig::{
    AdminOp, BoundPayload, ExternalSignature, Initiator, MultisigEngine, MultisigError,
    OperationId, WalletCreation,
};
use multisig_engine::storage::MemoryStore;

type Engine = MultisigEngine<MemoryStore, ManualHeight>;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn engine(designated: NativeAddress, guard: bool) -> (Engine, ManualHeight) {
    init_logging();
    let heights = ManualHeight::new(1);
    let engine = MultisigEngine::new(
        MemoryStore::new(),
        heights.clone(),
        WalletId::derive(b"engine"),
    );
    engine.init(designated, guard).unwrap();
    (engine, heights)
}

fn wallet(engine: &Engine, threshold: u8, signers: &[NativeAddress]) -> WalletId {
    let id = WalletId::derive(format!("wallet-{}", signers.len()).as_bytes());
    let request = WalletCreation::new(id, threshold, signers, &[]).unwrap();
    engine.create_wallet(&signers[0], &request, None).unwrap();
    id
}

#[test]
fn test_add_signer_through_approval() {
    let (a, b, c) = (
        KeyPair::generate().address(),
        KeyPair::generate().address(),
        KeyPair::generate().address(),
    );
    let (engine, _) = engine(a, false);
    let id = wallet(&engine, 2, &[a, b]);

    let op = OperationId::random();
    let add_c = AdminOp::add_native_signer(c);
    engine
        .init_admin_op(&Initiator::Native(a), &id, &op, 5, &add_c)
        .unwrap();

    assert!(matches!(
        engine.exec_admin_op(&id, &op, &add_c),
        Err(MultisigError::ThresholdNotMet { have: 1, need: 2 })
    ));
    engine.sign(&b, &id, &op).unwrap();

    let updated = engine.exec_admin_op(&id, &op, &add_c).unwrap();
    assert_eq!(updated.num_signers, 3);
    assert_eq!(engine.get_wallet(&id).unwrap(), updated);
    assert!(engine.is_native_signer(&id, &c).unwrap());

    // Replaying the same approval is rejected
    assert!(matches!(
        engine.exec_admin_op(&id, &op, &add_c),
        Err(MultisigError::OperationReused)
    ));
}

#[test]
fn test_admin_rebinding_forbidden() {
    let (a, b) = (KeyPair::generate().address(), KeyPair::generate().address());
    let (c, d) = (KeyPair::generate().address(), KeyPair::generate().address());
    let (engine, heights) = engine(a, false);
    let id = wallet(&engine, 2, &[a, b]);

    let op = OperationId::random();
    let add_c = AdminOp::add_native_signer(c);
    let add_d = AdminOp::add_native_signer(d);
    engine
        .init_admin_op(&Initiator::Native(a), &id, &op, 1, &add_c)
        .unwrap();
    heights.advance(2);

    assert!(matches!(
        engine.init_admin_op(&Initiator::Native(a), &id, &op, 1, &add_d),
        Err(MultisigError::PayloadRebindingForbidden)
    ));
    assert!(matches!(
        engine.initiate_signing_op(&Initiator::Native(a), &id, &op, 1),
        Err(MultisigError::PayloadRebindingForbidden)
    ));

    let pending = engine
        .init_admin_op(&Initiator::Native(a), &id, &op, 3, &add_c)
        .unwrap();
    assert_eq!(pending.round, 2);
    engine.sign(&b, &id, &op).unwrap();

    assert!(matches!(
        engine.exec_admin_op(&id, &op, &add_d),
        Err(MultisigError::PayloadMismatch)
    ));
    assert!(matches!(
        engine.execute_signing_op(&id, &op),
        Err(MultisigError::PayloadMismatch)
    ));
    engine.exec_admin_op(&id, &op, &add_c).unwrap();
    assert!(!engine.is_native_signer(&id, &d).unwrap());
}

#[test]
fn test_stale_unbound_op_cannot_become_admin_op() {
    let (a, b, c) = (
        KeyPair::generate().address(),
        KeyPair::generate().address(),
        KeyPair::generate().address(),
    );
    let (engine, heights) = engine(a, false);
    let id = wallet(&engine, 2, &[a, b]);

    let op = OperationId::random();
    engine
        .initiate_signing_op(&Initiator::Native(a), &id, &op, 1)
        .unwrap();
    heights.advance(2);

    assert!(matches!(
        engine.init_admin_op(&Initiator::Native(a), &id, &op, 3, &AdminOp::add_native_signer(c)),
        Err(MultisigError::PayloadRebindingForbidden)
    ));

    // The unbound operation can still be re-opened as it was
    let pending = engine
        .initiate_signing_op(&Initiator::Native(a), &id, &op, 3)
        .unwrap();
    assert_eq!(pending.round, 2);
}

#[test]
fn test_stale_admin_op_cannot_become_generic_bound_op() {
    let (a, b, c) = (
        KeyPair::generate().address(),
        KeyPair::generate().address(),
        KeyPair::generate().address(),
    );
    let (engine, heights) = engine(a, false);
    let id = wallet(&engine, 2, &[a, b]);

    let op = OperationId::random();
    let add_c = AdminOp::add_native_signer(c);
    engine
        .init_admin_op(&Initiator::Native(a), &id, &op, 1, &add_c)
        .unwrap();
    heights.advance(2);

    assert!(matches!(
        engine.initiate_bound_signing_op(&Initiator::Native(a), &id, &op, 3, &add_c.payload_hash()),
        Err(MultisigError::PayloadRebindingForbidden)
    ));
}

#[test]
fn test_vote_of_removed_signer_not_counted() {
    let (a, b, c) = (
        KeyPair::generate().address(),
        KeyPair::generate().address(),
        KeyPair::generate().address(),
    );
    let (engine, _) = engine(a, false);
    let id = wallet(&engine, 2, &[a, b, c]);

    let payment = OperationId::random();
    engine
        .initiate_signing_op(&Initiator::Native(b), &id, &payment, 20)
        .unwrap();

    let removal = OperationId::random();
    let remove_b = AdminOp::remove_native_signer(b);
    engine
        .init_admin_op(&Initiator::Native(a), &id, &removal, 20, &remove_b)
        .unwrap();
    engine.sign(&c, &id, &removal).unwrap();
    engine.exec_admin_op(&id, &removal, &remove_b).unwrap();
    assert!(!engine.is_native_signer(&id, &b).unwrap());

    // B's earlier vote is still in the stored counter but no longer counts
    assert_eq!(engine.sign(&a, &id, &payment).unwrap().confirmations, 2);
    assert!(matches!(
        engine.execute_signing_op(&id, &payment),
        Err(MultisigError::ThresholdNotMet { have: 1, need: 2 })
    ));

    engine.sign(&c, &id, &payment).unwrap();
    let receipt = engine.execute_signing_op(&id, &payment).unwrap();
    assert_eq!(receipt.confirmations, 2);
}

#[test]
fn test_threshold_raised_mid_flight() {
    let (a, b) = (KeyPair::generate().address(), KeyPair::generate().address());
    let (engine, _) = engine(a, false);
    let id = wallet(&engine, 1, &[a, b]);

    let payment = OperationId::random();
    engine
        .initiate_signing_op(&Initiator::Native(a), &id, &payment, 10)
        .unwrap();

    let raise = OperationId::random();
    let set_two = AdminOp::set_threshold(2);
    engine
        .init_admin_op(&Initiator::Native(a), &id, &raise, 10, &set_two)
        .unwrap();
    assert_eq!(engine.exec_admin_op(&id, &raise, &set_two).unwrap().threshold, 2);

    // Confirmations are checked against the live threshold
    assert!(matches!(
        engine.execute_signing_op(&id, &payment),
        Err(MultisigError::ThresholdNotMet { have: 1, need: 2 })
    ));
    engine.sign(&b, &id, &payment).unwrap();
    engine.execute_signing_op(&id, &payment).unwrap();
}

#[test]
fn test_removed_signer_loses_vote() {
    let (a, b, c) = (
        KeyPair::generate().address(),
        KeyPair::generate().address(),
        KeyPair::generate().address(),
    );
    let (engine, _) = engine(a, false);
    let id = wallet(&engine, 1, &[a, b, c]);

    let op = OperationId::random();
    let remove_b = AdminOp::remove_native_signer(b);
    engine
        .init_admin_op(&Initiator::Native(a), &id, &op, 5, &remove_b)
        .unwrap();
    let updated = engine.exec_admin_op(&id, &op, &remove_b).unwrap();
    assert_eq!(updated.native_signers[0], a);
    assert_eq!(updated.native_signers[1], c);
    assert_eq!(updated.num_signers, 2);
    assert!(!engine.is_native_signer(&id, &b).unwrap());

    let next = OperationId::random();
    engine
        .initiate_signing_op(&Initiator::Native(c), &id, &next, 5)
        .unwrap();
    assert!(matches!(
        engine.sign(&b, &id, &next),
        Err(MultisigError::UnknownSigner)
    ));
}

#[test]
fn test_invalid_admin_effect_is_rejected_whole() {
    let (a, b) = (KeyPair::generate().address(), KeyPair::generate().address());
    let (engine, _) = engine(a, false);
    let id = wallet(&engine, 2, &[a, b]);

    let op = OperationId::random();
    let remove_b = AdminOp::remove_native_signer(b);
    engine
        .init_admin_op(&Initiator::Native(a), &id, &op, 5, &remove_b)
        .unwrap();
    engine.sign(&b, &id, &op).unwrap();

    assert!(matches!(
        engine.exec_admin_op(&id, &op, &remove_b),
        Err(MultisigError::InvalidThreshold {
            threshold: 2,
            signers: 1
        })
    ));
    assert!(engine.is_native_signer(&id, &b).unwrap());
    assert!(!engine.is_signing_complete(&id, &op).unwrap());
}

#[test]
fn test_add_external_signer() {
    let a = KeyPair::generate().address();
    let external = ExternalKeyPair::generate();
    let (engine, _) = engine(a, false);
    let id = wallet(&engine, 1, &[a]);

    let op = OperationId::random();
    let add = AdminOp::add_external_signer(external.address());
    engine
        .init_admin_op(&Initiator::Native(a), &id, &op, 5, &add)
        .unwrap();
    engine.exec_admin_op(&id, &op, &add).unwrap();
    assert!(engine.is_external_signer(&id, &external.address()).unwrap());

    let vote = OperationId::random();
    engine
        .initiate_signing_op(&Initiator::Native(a), &id, &vote, 5)
        .unwrap();
    let credential = ExternalSignature::create(&external, &id, &vote, 9);
    assert_eq!(engine.sign_external(&id, &vote, &credential).unwrap().confirmations, 2);
}

#[test]
fn test_guarded_creation() {
    let designated = KeyPair::generate().address();
    let other = KeyPair::generate().address();
    let (engine, _) = engine(designated, true);
    let engine_id = engine.engine_wallet_id();

    // Only the designated address may bootstrap the engine wallet
    let bootstrap = WalletCreation::new(engine_id, 1, &[designated], &[]).unwrap();
    assert!(matches!(
        engine.create_wallet(&other, &bootstrap, None),
        Err(MultisigError::Unauthorized)
    ));
    engine.create_wallet(&designated, &bootstrap, None).unwrap();

    let request =
        WalletCreation::new(WalletId::derive(b"guarded"), 1, &[other], &[]).unwrap();
    assert!(matches!(
        engine.create_wallet(&other, &request, None),
        Err(MultisigError::CreationNotApproved)
    ));

    // An approval for a different configuration does not count
    let decoy = WalletCreation::new(request.wallet_id, 1, &[designated], &[]).unwrap();
    let decoy_op = OperationId::random();
    engine
        .initiate_bound_signing_op(&Initiator::Native(designated), &engine_id, &decoy_op, 5, &decoy)
        .unwrap();
    engine
        .execute_bound_signing_op(&engine_id, &decoy_op, &decoy)
        .unwrap();
    assert!(matches!(
        engine.create_wallet(&other, &request, Some(&decoy_op)),
        Err(MultisigError::CreationNotApproved)
    ));

    // Pending approval is not enough
    let approval = OperationId::random();
    engine
        .initiate_bound_signing_op(
            &Initiator::Native(designated),
            &engine_id,
            &approval,
            5,
            &request,
        )
        .unwrap();
    assert!(matches!(
        engine.create_wallet(&other, &request, Some(&approval)),
        Err(MultisigError::CreationNotApproved)
    ));

    let receipt = engine
        .execute_bound_signing_op(&engine_id, &approval, &request.payload_hash())
        .unwrap();
    assert_eq!(receipt.wallet_id, engine_id);

    let created = engine
        .create_wallet(&other, &request, Some(&approval))
        .unwrap();
    assert_eq!(created.description(), "1-of-1");
    assert!(engine.is_native_signer(&request.wallet_id, &other).unwrap());
}

#[test]
fn test_unguarded_engine_wallet_still_needs_designated() {
    let designated = KeyPair::generate().address();
    let other = KeyPair::generate().address();
    let (engine, _) = engine(designated, false);

    let bootstrap =
        WalletCreation::new(engine.engine_wallet_id(), 1, &[other], &[]).unwrap();
    assert!(matches!(
        engine.create_wallet(&other, &bootstrap, None),
        Err(MultisigError::Unauthorized)
    ));
    engine.create_wallet(&designated, &bootstrap, None).unwrap();
}
